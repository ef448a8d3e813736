// ============================================================================
// GPU MODULE: capability interface, texture bookkeeping and backends
// ============================================================================
//
// Architecture:
//   mod.rs         : GpuContext trait: the thin capability surface the
//                     compositor drives (textures, framebuffers, units, blend)
//   slots.rs       : TextureSlotManager: N texture units shared by many
//                     logical textures, least-recently-used eviction
//   texture.rs     : Texture + TextureCache (lazy creation, unit binding)
//   software.rs    : CPU backend (premultiplied float images, rayon rows)
//   context.rs     : wgpu Device, Queue, adapter init
//   shaders.rs     : WGSL source for the wgpu backend
//   wgpu_backend.rs: GpuContext implemented on wgpu
// ============================================================================

pub mod context;
pub mod shaders;
pub mod slots;
pub mod software;
pub mod texture;
pub mod wgpu_backend;

pub use slots::{Slot, SlotBinding, TextureSlotManager};
pub use software::SoftwareGpu;
pub use texture::{Texture, TextureCache, TextureId};
pub use wgpu_backend::WgpuGpu;

use crate::color::LinearRgb;
use crate::geometry::{Rect, Size};
use crate::stroke::{BrushBlend, Stamp};

/// Backend-side image (texture storage).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u32);

/// Backend-side render target wrapping one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

/// Where draw calls land.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderTarget {
    /// The visible canvas.
    #[default]
    Screen,
    Framebuffer(FramebufferHandle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    OneMinusSrcAlpha,
}

impl BlendFactor {
    fn weight(self, src_alpha: f32) -> f32 {
        match self {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
        }
    }
}

/// `out = src * src_factor + dst * dst_factor`, on premultiplied colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendFactors {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFactors {
    /// Premultiplied source-over.
    pub const NORMAL: BlendFactors = BlendFactors {
        src: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
    /// Removes destination coverage by the source alpha.
    pub const ERASE: BlendFactors = BlendFactors {
        src: BlendFactor::Zero,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
    pub const REPLACE: BlendFactors = BlendFactors {
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
    };

    pub fn apply(&self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        let s = self.src.weight(src[3]);
        let d = self.dst.weight(src[3]);
        [
            src[0] * s + dst[0] * d,
            src[1] * s + dst[1] * d,
            src[2] * s + dst[2] * d,
            src[3] * s + dst[3] * d,
        ]
    }
}

impl From<BrushBlend> for BlendFactors {
    fn from(blend: BrushBlend) -> Self {
        match blend {
            BrushBlend::Normal => BlendFactors::NORMAL,
            BrushBlend::Erase => BlendFactors::ERASE,
        }
    }
}

/// Coverage of a round stamp at normalised distance `d` (1.0 = rim).
/// Fully opaque inside `hardness`, linear falloff to the rim.
pub fn stamp_coverage(d: f32, hardness: f32) -> f32 {
    if d >= 1.0 {
        0.0
    } else if d <= hardness {
        1.0
    } else {
        (1.0 - d) / (1.0 - hardness).max(f32::EPSILON)
    }
}

/// The GPU capabilities the compositor needs. State-machine style: bind a
/// target, set blend/scissor, then issue draws.
///
/// All colours are premultiplied linear RGB. Texture units are numbered
/// `0..max_texture_units()`.
pub trait GpuContext {
    fn max_texture_units(&self) -> usize;
    /// Size of the visible canvas (`RenderTarget::Screen`).
    fn screen_size(&self) -> Size;

    fn create_texture(&mut self, size: Size) -> ImageHandle;
    fn delete_texture(&mut self, image: ImageHandle);
    fn create_framebuffer(&mut self, image: ImageHandle) -> FramebufferHandle;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn bind_framebuffer(&mut self, target: RenderTarget);
    fn bind_texture(&mut self, unit: usize, image: ImageHandle);
    fn set_blend(&mut self, blend: BlendFactors);
    /// Restrict subsequent clears and draws; `None` = whole target.
    fn set_scissor(&mut self, rect: Option<Rect>);

    /// Set the scissored part of the bound target to transparent.
    fn clear(&mut self);
    /// Full-target quad sampling the texture bound to `unit`.
    fn draw_texture(&mut self, unit: usize, opacity: f32);
    /// Round brush stamps, in order.
    fn draw_stamps(&mut self, stamps: &[Stamp], hardness: f32);
    fn fill_rect(&mut self, rect: Rect, color: LinearRgb, alpha: f32);

    /// Unpremultiplied 8-bit sRGB copy of a target, for export and tests.
    fn read_pixels(&mut self, target: RenderTarget) -> Option<image::RgbaImage>;
}

/// Convert a premultiplied linear pixel to straight 8-bit sRGB.
pub fn encode_pixel(px: [f32; 4]) -> [u8; 4] {
    let a = px[3].clamp(0.0, 1.0);
    if a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let [r, g, b] = LinearRgb::new(px[0] / a, px[1] / a, px[2] / a).to_srgb8();
    [r, g, b, (a * 255.0).round() as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_blend_is_source_over() {
        let out = BlendFactors::NORMAL.apply([0.5, 0.0, 0.0, 0.5], [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(out, [0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn erase_blend_removes_coverage() {
        let out = BlendFactors::ERASE.apply([0.2, 0.2, 0.2, 1.0], [0.3, 0.6, 0.9, 1.0]);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.0]);
        let half = BlendFactors::ERASE.apply([0.0, 0.0, 0.0, 0.5], [0.4, 0.4, 0.4, 1.0]);
        assert_eq!(half, [0.2, 0.2, 0.2, 0.5]);
    }

    #[test]
    fn coverage_profile() {
        assert_eq!(stamp_coverage(0.2, 0.5), 1.0);
        assert_eq!(stamp_coverage(1.0, 0.5), 0.0);
        assert!((stamp_coverage(0.75, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(stamp_coverage(0.5, 1.0), 1.0);
    }
}
