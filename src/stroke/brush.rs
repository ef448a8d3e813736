use crate::color::LinearRgb;
use crate::geometry::{Rect, Vec2};

/// How a finished stroke is merged into the layer it was painted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushBlend {
    #[default]
    Normal,
    /// Stamp alpha removes coverage from the layer instead of adding colour.
    Erase,
}

impl BrushBlend {
    pub fn name(&self) -> &'static str {
        match self {
            BrushBlend::Normal => "normal",
            BrushBlend::Erase => "erase",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "normal" | "paint" => Some(BrushBlend::Normal),
            "erase" | "eraser" => Some(BrushBlend::Erase),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrushSettings {
    /// Diameter at full pressure, in canvas pixels.
    pub diameter_px: f32,
    /// Stamp spacing as a fraction of the diameter.
    pub spacing_pct: f32,
    /// 0 = fully soft falloff, 1 = hard edge.
    pub hardness: f32,
    pub color: LinearRgb,
    /// Per-stamp alpha (flow).
    pub alpha: f32,
    /// Tip rotation in radians.
    pub rotation: f32,
    pub blend: BrushBlend,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            diameter_px: 20.0,
            spacing_pct: 0.1,
            hardness: 0.75,
            color: LinearRgb::BLACK,
            alpha: 1.0,
            rotation: 0.0,
            blend: BrushBlend::Normal,
        }
    }
}

impl BrushSettings {
    /// Distance between stamps at full pressure.
    pub fn spacing_px(&self) -> f32 {
        self.spacing_pct * self.diameter_px
    }
}

/// One normalised pointer event, already in canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub position: Vec2,
    /// 0..=1
    pub pressure: f32,
    /// Milliseconds on the caller's clock.
    pub time: f64,
}

impl PointerSample {
    pub fn new(x: f32, y: f32, pressure: f32, time: f64) -> Self {
        Self {
            position: Vec2::new(x, y),
            pressure: pressure.clamp(0.0, 1.0),
            time,
        }
    }
}

/// One brush impression. Produced by the interpolator, never mutated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stamp {
    pub color: LinearRgb,
    pub alpha: f32,
    pub position: Vec2,
    pub scaled_diameter: f32,
    pub rotation: f32,
}

impl Stamp {
    /// Pixels this stamp can touch.
    pub fn bounds(&self) -> Rect {
        Rect::around(self.position, self.scaled_diameter * 0.5)
    }
}

/// The interpolation cursor: every attribute that varies along a stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokePoint {
    pub position: Vec2,
    pub pressure: f32,
    pub rotation: f32,
    pub color: LinearRgb,
    pub alpha: f32,
}

impl StrokePoint {
    pub fn from_sample(sample: &PointerSample, brush: &BrushSettings) -> Self {
        Self {
            position: sample.position,
            pressure: sample.pressure,
            rotation: brush.rotation,
            color: brush.color,
            alpha: brush.alpha,
        }
    }

    pub fn distance(&self, other: &StrokePoint) -> f32 {
        self.position.distance(other.position)
    }

    /// Advance `t` of the way toward `other`, each attribute independently.
    pub fn lerp(&self, other: &StrokePoint, t: f32) -> StrokePoint {
        StrokePoint {
            position: self.position.lerp(other.position, t),
            pressure: self.pressure + (other.pressure - self.pressure) * t,
            rotation: self.rotation + (other.rotation - self.rotation) * t,
            color: self.color.mix(t, other.color),
            alpha: self.alpha + (other.alpha - self.alpha) * t,
        }
    }

    pub fn to_stamp(&self, brush: &BrushSettings) -> Stamp {
        Stamp {
            color: self.color,
            alpha: self.alpha,
            position: self.position,
            scaled_diameter: brush.diameter_px * self.pressure,
            rotation: self.rotation,
        }
    }
}
