// ============================================================================
// ENGINE SETTINGS: `key=value` .cfg persistence
// ============================================================================
//
// Unknown keys are skipped and unparsable values keep their default, so an
// old or hand-edited file never prevents startup.
// ============================================================================

use std::path::{Path, PathBuf};

use crate::error::EngineResult;
use crate::geometry::Size;
use crate::logger::Level;
use crate::stroke::BrushSettings;

/// Which `GpuContext` implementation renders the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Software,
    Wgpu,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Software => "software",
            Backend::Wgpu => "wgpu",
        }
    }

    pub fn from_name(name: &str) -> Option<Backend> {
        match name.trim().to_lowercase().as_str() {
            "software" | "cpu" => Some(Backend::Software),
            "wgpu" | "gpu" => Some(Backend::Wgpu),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Size of the texture slot pool. Capped by the backend's unit count.
    pub texture_units: usize,
    pub brush_diameter: f32,
    pub brush_spacing: f32,
    pub brush_hardness: f32,
    /// Pointer smoothing time constant; 0 disables smoothing.
    pub smoothing_ms: f32,
    /// Tint the 64px blocks each frame touched.
    pub debug_blocks: bool,
    pub log_level: Level,
    pub backend: Backend,
    /// Substring of the adapter name to prefer; empty = any.
    pub preferred_gpu: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let brush = BrushSettings::default();
        Self {
            canvas_width: 1024,
            canvas_height: 768,
            texture_units: 16,
            brush_diameter: brush.diameter_px,
            brush_spacing: brush.spacing_pct,
            brush_hardness: brush.hardness,
            smoothing_ms: 0.0,
            debug_blocks: false,
            log_level: Level::Info,
            backend: Backend::Software,
            preferred_gpu: String::new(),
        }
    }
}

impl EngineSettings {
    /// `~/.config/paintfe-engine/engine.cfg` (XDG_CONFIG_HOME respected),
    /// `%APPDATA%\PaintFE-Engine\engine.cfg` on Windows.
    pub fn default_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                return Some(PathBuf::from(appdata).join("PaintFE-Engine").join("engine.cfg"));
            }
        }
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join("paintfe-engine").join("engine.cfg"));
        }
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config").join("paintfe-engine").join("engine.cfg"))
    }

    pub fn canvas_size(&self) -> Size {
        Size::new(self.canvas_width, self.canvas_height)
    }

    /// Brush defaults derived from these settings.
    pub fn brush(&self) -> BrushSettings {
        BrushSettings {
            diameter_px: self.brush_diameter,
            spacing_pct: self.brush_spacing,
            hardness: self.brush_hardness,
            ..BrushSettings::default()
        }
    }

    /// Load settings from `path` (defaults if missing or unreadable).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                crate::log_info!("settings: {} not read ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => {
                    s.canvas_width = val.parse().ok().filter(|w| *w > 0).unwrap_or(s.canvas_width);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse().ok().filter(|h| *h > 0).unwrap_or(s.canvas_height);
                }
                "texture_units" => {
                    s.texture_units = val.parse().ok().filter(|n| *n > 0).unwrap_or(s.texture_units);
                }
                "brush_diameter" => {
                    s.brush_diameter = val.parse().ok().filter(|d: &f32| *d > 0.0).unwrap_or(s.brush_diameter);
                }
                "brush_spacing" => {
                    s.brush_spacing = val.parse().ok().filter(|p: &f32| *p > 0.0).unwrap_or(s.brush_spacing);
                }
                "brush_hardness" => {
                    if let Ok(h) = val.parse::<f32>() {
                        s.brush_hardness = h.clamp(0.0, 1.0);
                    }
                }
                "smoothing_ms" => {
                    if let Ok(ms) = val.parse::<f32>() {
                        s.smoothing_ms = ms.max(0.0);
                    }
                }
                "debug_blocks" => {
                    s.debug_blocks = val == "true";
                }
                "log_level" => {
                    if let Some(level) = Level::from_name(val) {
                        s.log_level = level;
                    }
                }
                "backend" => {
                    if let Some(backend) = Backend::from_name(val) {
                        s.backend = backend;
                    }
                }
                "preferred_gpu" => {
                    s.preferred_gpu = val.to_string();
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             texture_units={}\n\
             brush_diameter={}\n\
             brush_spacing={}\n\
             brush_hardness={}\n\
             smoothing_ms={}\n\
             debug_blocks={}\n\
             log_level={}\n\
             backend={}\n\
             preferred_gpu={}\n",
            self.canvas_width,
            self.canvas_height,
            self.texture_units,
            self.brush_diameter,
            self.brush_spacing,
            self.brush_hardness,
            self.smoothing_ms,
            self.debug_blocks,
            self.log_level.to_string().to_lowercase(),
            self.backend.name(),
            self.preferred_gpu,
        )
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }
}
