// ============================================================================
// SOFTWARE BACKEND: GpuContext on premultiplied linear f32 images
// ============================================================================
//
// Same state machine as the hardware path (bound target, blend, scissor,
// texture units) so the compositor cannot tell the difference.  Blending runs
// row-parallel with rayon; stamps are rasterised one after another so their
// order is preserved.
// ============================================================================

use std::collections::HashMap;

use image::Rgba32FImage;
use rayon::prelude::*;

use super::{
    BlendFactors, FramebufferHandle, GpuContext, ImageHandle, RenderTarget, encode_pixel,
    stamp_coverage,
};
use crate::color::LinearRgb;
use crate::geometry::{Rect, Size, Vec2};
use crate::stroke::Stamp;

/// Counters for tests and the CLI summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u64,
    pub clears: u64,
    pub stamps: u64,
}

pub struct SoftwareGpu {
    screen: Rgba32FImage,
    images: HashMap<ImageHandle, Rgba32FImage>,
    framebuffers: HashMap<FramebufferHandle, ImageHandle>,
    units: Vec<Option<ImageHandle>>,
    target: RenderTarget,
    blend: BlendFactors,
    scissor: Option<Rect>,
    next_handle: u32,
    stats: DrawStats,
}

/// Pixel region `(x, y, w, h)`.
type Region = (u32, u32, u32, u32);

impl SoftwareGpu {
    pub fn new(screen: Size, texture_units: usize) -> Self {
        Self {
            screen: Rgba32FImage::new(screen.width, screen.height),
            images: HashMap::new(),
            framebuffers: HashMap::new(),
            units: vec![None; texture_units.max(1)],
            target: RenderTarget::Screen,
            blend: BlendFactors::NORMAL,
            scissor: None,
            next_handle: 1,
            stats: DrawStats::default(),
        }
    }

    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DrawStats::default();
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Premultiplied linear pixel of a target.
    pub fn pixel(&self, target: RenderTarget, x: u32, y: u32) -> Option<[f32; 4]> {
        let img = self.image_for(target)?;
        (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y).0)
    }

    fn image_for(&self, target: RenderTarget) -> Option<&Rgba32FImage> {
        match target {
            RenderTarget::Screen => Some(&self.screen),
            RenderTarget::Framebuffer(fb) => self.images.get(self.framebuffers.get(&fb)?),
        }
    }

    fn alloc_handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    /// Run `f` on the bound target with read access to every other image.
    fn with_target<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Rgba32FImage, &HashMap<ImageHandle, Rgba32FImage>),
    {
        match self.target {
            RenderTarget::Screen => f(&mut self.screen, &self.images),
            RenderTarget::Framebuffer(fb) => {
                let Some(handle) = self.framebuffers.get(&fb).copied() else {
                    crate::log_err!("software: draw into deleted framebuffer {:?}", fb);
                    return;
                };
                let Some(mut dst) = self.images.remove(&handle) else {
                    crate::log_err!("software: framebuffer {:?} lost its image", fb);
                    return;
                };
                f(&mut dst, &self.images);
                self.images.insert(handle, dst);
            }
        }
    }

    /// `rect` clipped to the scissor and the target bounds.
    fn region(scissor: Option<Rect>, rect: Rect, target: Size) -> Region {
        let clipped = match scissor {
            Some(s) => rect.intersect(&s),
            None => rect,
        };
        clipped.to_pixels(target)
    }
}

fn size_of(img: &Rgba32FImage) -> Size {
    Size::new(img.width(), img.height())
}

/// Blend `src_at(x, y)` over `dst` inside `region`, one rayon task per row.
fn blend_region<F>(dst: &mut Rgba32FImage, region: Region, blend: BlendFactors, src_at: F)
where
    F: Fn(u32, u32) -> Option<[f32; 4]> + Sync,
{
    let (x0, y0, w, h) = region;
    if w == 0 || h == 0 {
        return;
    }
    let stride = dst.width() as usize * 4;
    let buf: &mut [f32] = dst;
    buf.par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take(h as usize)
        .for_each(|(y, row)| {
            for x in x0..x0 + w {
                let Some(src) = src_at(x, y as u32) else { continue };
                let i = x as usize * 4;
                let d = [row[i], row[i + 1], row[i + 2], row[i + 3]];
                row[i..i + 4].copy_from_slice(&blend.apply(src, d));
            }
        });
}

impl GpuContext for SoftwareGpu {
    fn max_texture_units(&self) -> usize {
        self.units.len()
    }

    fn screen_size(&self) -> Size {
        size_of(&self.screen)
    }

    fn create_texture(&mut self, size: Size) -> ImageHandle {
        let handle = ImageHandle(self.alloc_handle());
        self.images.insert(handle, Rgba32FImage::new(size.width, size.height));
        handle
    }

    fn delete_texture(&mut self, image: ImageHandle) {
        self.images.remove(&image);
        for unit in self.units.iter_mut().filter(|u| **u == Some(image)) {
            *unit = None;
        }
    }

    fn create_framebuffer(&mut self, image: ImageHandle) -> FramebufferHandle {
        let handle = FramebufferHandle(self.alloc_handle());
        self.framebuffers.insert(handle, image);
        handle
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
        if self.target == RenderTarget::Framebuffer(framebuffer) {
            self.target = RenderTarget::Screen;
        }
    }

    fn bind_framebuffer(&mut self, target: RenderTarget) {
        self.target = target;
    }

    fn bind_texture(&mut self, unit: usize, image: ImageHandle) {
        match self.units.get_mut(unit) {
            Some(slot) => *slot = Some(image),
            None => {
                crate::log_err!("software: texture unit {} out of range", unit);
            }
        }
    }

    fn set_blend(&mut self, blend: BlendFactors) {
        self.blend = blend;
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.scissor = rect;
    }

    fn clear(&mut self) {
        self.stats.clears += 1;
        let scissor = self.scissor;
        self.with_target(|dst, _| {
            let size = size_of(dst);
            let region = Self::region(scissor, size.rect(), size);
            blend_region(dst, region, BlendFactors::REPLACE, |_, _| Some([0.0; 4]));
        });
    }

    fn draw_texture(&mut self, unit: usize, opacity: f32) {
        let Some(source) = self.units.get(unit).copied().flatten() else {
            crate::log_warn!("software: draw from empty texture unit {}", unit);
            return;
        };
        self.stats.draw_calls += 1;
        let (blend, scissor) = (self.blend, self.scissor);
        self.with_target(|dst, images| {
            // sampling the bound target itself is undefined; skip
            let Some(src) = images.get(&source) else { return };
            let size = size_of(dst);
            let region = Self::region(scissor, size.rect(), size);
            let (sw, sh) = (src.width(), src.height());
            if sw == 0 || sh == 0 {
                return;
            }
            blend_region(dst, region, blend, |x, y| {
                let sx = (x as u64 * sw as u64 / size.width as u64) as u32;
                let sy = (y as u64 * sh as u64 / size.height as u64) as u32;
                let p = src.get_pixel(sx, sy).0;
                Some([p[0] * opacity, p[1] * opacity, p[2] * opacity, p[3] * opacity])
            });
        });
    }

    fn draw_stamps(&mut self, stamps: &[Stamp], hardness: f32) {
        if stamps.is_empty() {
            return;
        }
        self.stats.draw_calls += 1;
        self.stats.stamps += stamps.len() as u64;
        let (blend, scissor) = (self.blend, self.scissor);
        self.with_target(|dst, _| {
            let size = size_of(dst);
            for stamp in stamps {
                let radius = stamp.scaled_diameter * 0.5;
                if radius <= 0.0 {
                    continue;
                }
                let region = Self::region(scissor, stamp.bounds(), size);
                let color = stamp.color.premultiplied(stamp.alpha);
                blend_region(dst, region, blend, |x, y| {
                    let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let coverage = stamp_coverage(center.distance(stamp.position) / radius, hardness);
                    (coverage > 0.0).then(|| color.map(|c| c * coverage))
                });
            }
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: LinearRgb, alpha: f32) {
        self.stats.draw_calls += 1;
        let (blend, scissor) = (self.blend, self.scissor);
        let src = color.premultiplied(alpha);
        self.with_target(|dst, _| {
            let size = size_of(dst);
            let region = Self::region(scissor, rect, size);
            blend_region(dst, region, blend, |_, _| Some(src));
        });
    }

    fn read_pixels(&mut self, target: RenderTarget) -> Option<image::RgbaImage> {
        let img = self.image_for(target)?;
        let mut out = image::RgbaImage::new(img.width(), img.height());
        out.par_chunks_mut(4)
            .zip(img.par_chunks(4))
            .for_each(|(o, p)| o.copy_from_slice(&encode_pixel([p[0], p[1], p[2], p[3]])));
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SoftwareGpu, ImageHandle, FramebufferHandle) {
        let mut gpu = SoftwareGpu::new(Size::new(16, 16), 4);
        let image = gpu.create_texture(Size::new(16, 16));
        let fb = gpu.create_framebuffer(image);
        (gpu, image, fb)
    }

    #[test]
    fn fill_then_draw_texture_to_screen() {
        let (mut gpu, image, fb) = setup();
        gpu.bind_framebuffer(RenderTarget::Framebuffer(fb));
        gpu.fill_rect(Rect::new(0.0, 0.0, 8.0, 16.0), LinearRgb::new(1.0, 0.0, 0.0), 1.0);

        gpu.bind_texture(0, image);
        gpu.bind_framebuffer(RenderTarget::Screen);
        gpu.draw_texture(0, 0.5);

        let left = gpu.pixel(RenderTarget::Screen, 2, 2).unwrap();
        let right = gpu.pixel(RenderTarget::Screen, 12, 2).unwrap();
        assert_eq!(left, [0.5, 0.0, 0.0, 0.5]);
        assert_eq!(right, [0.0; 4]);
    }

    #[test]
    fn scissor_limits_clear() {
        let (mut gpu, _, fb) = setup();
        let target = RenderTarget::Framebuffer(fb);
        gpu.bind_framebuffer(target);
        gpu.fill_rect(Size::new(16, 16).rect(), LinearRgb::WHITE, 1.0);
        gpu.set_scissor(Some(Rect::new(0.0, 0.0, 4.0, 4.0)));
        gpu.clear();
        assert_eq!(gpu.pixel(target, 1, 1), Some([0.0; 4]));
        assert_eq!(gpu.pixel(target, 8, 8), Some([1.0; 4]));
    }

    #[test]
    fn hard_stamp_covers_its_disc_only() {
        let (mut gpu, _, fb) = setup();
        let target = RenderTarget::Framebuffer(fb);
        gpu.bind_framebuffer(target);
        let stamp = Stamp {
            color: LinearRgb::new(0.0, 1.0, 0.0),
            alpha: 1.0,
            position: Vec2::new(8.0, 8.0),
            scaled_diameter: 8.0,
            rotation: 0.0,
        };
        gpu.draw_stamps(&[stamp], 1.0);
        assert_eq!(gpu.pixel(target, 8, 8), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(gpu.pixel(target, 0, 0), Some([0.0; 4]));
        assert_eq!(gpu.stats().stamps, 1);
    }

    #[test]
    fn erase_blend_clears_painted_pixels() {
        let (mut gpu, _, fb) = setup();
        let target = RenderTarget::Framebuffer(fb);
        gpu.bind_framebuffer(target);
        gpu.fill_rect(Size::new(16, 16).rect(), LinearRgb::WHITE, 1.0);
        gpu.set_blend(BlendFactors::ERASE);
        gpu.fill_rect(Rect::new(0.0, 0.0, 16.0, 8.0), LinearRgb::BLACK, 1.0);
        assert_eq!(gpu.pixel(target, 4, 4), Some([0.0; 4]));
        assert_eq!(gpu.pixel(target, 4, 12), Some([1.0; 4]));
    }

    #[test]
    fn read_pixels_unpremultiplies() {
        let (mut gpu, _, fb) = setup();
        let target = RenderTarget::Framebuffer(fb);
        gpu.bind_framebuffer(target);
        gpu.fill_rect(Size::new(16, 16).rect(), LinearRgb::WHITE, 0.5);
        let img = gpu.read_pixels(target).unwrap();
        assert_eq!(img.get_pixel(3, 3).0, [255, 255, 255, 128]);
    }
}
