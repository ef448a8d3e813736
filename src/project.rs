use std::path::Path;

use uuid::Uuid;

use crate::color::LinearRgb;
use crate::compositor::{Compositor, FrameStats};
use crate::document::Document;
use crate::error::{EngineError, EngineResult};
use crate::gpu::{GpuContext, RenderTarget, SoftwareGpu, WgpuGpu};
use crate::layers::LayerId;
use crate::settings::{Backend, EngineSettings};

/// Open the backend named in `settings`, falling back to the CPU renderer
/// when no wgpu adapter can be used.
pub fn create_backend(settings: &EngineSettings) -> Box<dyn GpuContext> {
    let size = settings.canvas_size();
    match settings.backend {
        Backend::Software => Box::new(SoftwareGpu::new(size, settings.texture_units)),
        Backend::Wgpu => match WgpuGpu::try_new(size, &settings.preferred_gpu) {
            Ok(gpu) => Box::new(gpu),
            Err(e) => {
                crate::log_warn!("project: {}; falling back to software rendering", e);
                Box::new(SoftwareGpu::new(size, settings.texture_units))
            }
        },
    }
}

/// Single open document with the renderer that draws it.
pub struct Project {
    pub id: Uuid,
    /// Display name ("Untitled-X" until renamed).
    pub name: String,
    pub document: Document,
    compositor: Compositor,
    gpu: Box<dyn GpuContext>,
    frames_rendered: u64,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, settings: &EngineSettings) -> Self {
        Self::with_backend(untitled_counter, settings, create_backend(settings))
    }

    pub fn with_backend(untitled_counter: usize, settings: &EngineSettings, mut gpu: Box<dyn GpuContext>) -> Self {
        let mut compositor = Compositor::new(gpu.as_mut(), settings.canvas_size(), settings.texture_units);
        compositor.set_debug_blocks(settings.debug_blocks);
        Self {
            id: Uuid::new_v4(),
            name: format!("Untitled-{}", untitled_counter),
            document: Document::new(settings.brush(), settings.smoothing_ms),
            compositor,
            gpu,
            frames_rendered: 0,
        }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn gpu(&self) -> &dyn GpuContext {
        self.gpu.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// One frame: hand the document's state to the compositor.
    pub fn render_frame(&mut self) -> EngineResult<FrameStats> {
        let frame = self.document.take_frame();
        let stats = self.compositor.render(self.gpu.as_mut(), frame)?;
        self.frames_rendered += 1;
        Ok(stats)
    }

    /// Fill a leaf's pixels with one colour.
    pub fn fill_layer(&mut self, id: LayerId, color: LinearRgb, alpha: f32) -> EngineResult<()> {
        let path = self.document.path_of(id)?;
        if !self.document.tree().get(&path)?.is_leaf() {
            return Err(EngineError::NotAGroup(path));
        }
        self.compositor.fill_layer(self.gpu.as_mut(), id, color, alpha);
        Ok(())
    }

    /// The visible canvas as straight-alpha sRGB.
    pub fn canvas_image(&mut self) -> EngineResult<image::RgbaImage> {
        self.gpu
            .read_pixels(RenderTarget::Screen)
            .ok_or_else(|| EngineError::Gpu("canvas readback failed".to_string()))
    }

    pub fn export_png(&mut self, path: &Path) -> EngineResult<()> {
        let img = self.canvas_image()?;
        img.save_with_format(path, image::ImageFormat::Png)?;
        crate::log_info!("project {}: exported {}", self.name, path.display());
        Ok(())
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        self.compositor.destroy(self.gpu.as_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::PointerSample;

    fn settings() -> EngineSettings {
        EngineSettings {
            canvas_width: 32,
            canvas_height: 32,
            texture_units: 4,
            ..EngineSettings::default()
        }
    }

    #[test]
    fn stroke_shows_up_on_canvas() {
        let mut project = Project::new_untitled(1, &settings());
        let bg = project.document.current().unwrap().id;
        project.fill_layer(bg, LinearRgb::WHITE, 1.0).unwrap();
        project.render_frame().unwrap();

        project.document.on_click(PointerSample::new(4.0, 16.0, 1.0, 0.0)).unwrap();
        project.document.on_drag(&[PointerSample::new(28.0, 16.0, 1.0, 16.0)]);
        project.render_frame().unwrap();
        project.document.on_release();
        let stats = project.render_frame().unwrap();
        assert!(stats.stroke_merged);

        let img = project.canvas_image().unwrap();
        assert_eq!(img.get_pixel(16, 16).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(16, 2).0, [255, 255, 255, 255]);
        assert_eq!(project.frames_rendered(), 3);
    }

    #[test]
    fn fill_rejects_groups() {
        let mut project = Project::new_untitled(2, &settings());
        let root = project.document.tree().root().id;
        assert!(project.fill_layer(root, LinearRgb::WHITE, 1.0).is_err());
    }
}
