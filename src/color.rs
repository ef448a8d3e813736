// ============================================================================
// COLOR: linear RGB value type shared by strokes and compositing
// ============================================================================

/// A colour in linear RGB, each channel nominally in 0..=1.
///
/// Alpha travels separately (on the stamp) so colours can be mixed without
/// premultiplication concerns.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct LinearRgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LinearRgb {
    pub const BLACK: LinearRgb = LinearRgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: LinearRgb = LinearRgb { r: 1.0, g: 1.0, b: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Move `pct` of the way from `self` toward `other`.
    pub fn mix(self, pct: f32, other: LinearRgb) -> LinearRgb {
        LinearRgb {
            r: self.r + (other.r - self.r) * pct,
            g: self.g + (other.g - self.g) * pct,
            b: self.b + (other.b - self.b) * pct,
        }
    }

    /// Decode an 8-bit sRGB triple.
    pub fn from_srgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: srgb_to_linear(r as f32 / 255.0),
            g: srgb_to_linear(g as f32 / 255.0),
            b: srgb_to_linear(b as f32 / 255.0),
        }
    }

    /// Encode to an 8-bit sRGB triple.
    pub fn to_srgb8(self) -> [u8; 3] {
        [
            (linear_to_srgb(self.r) * 255.0).round() as u8,
            (linear_to_srgb(self.g) * 255.0).round() as u8,
            (linear_to_srgb(self.b) * 255.0).round() as u8,
        ]
    }

    /// Premultiply into an RGBA quadruple.
    pub fn premultiplied(self, alpha: f32) -> [f32; 4] {
        [self.r * alpha, self.g * alpha, self.b * alpha, alpha]
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::from_srgb8(r, g, b))
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_linear_per_channel() {
        let a = LinearRgb::new(0.0, 0.5, 1.0);
        let b = LinearRgb::new(1.0, 0.5, 0.0);
        assert_eq!(a.mix(0.25, b), LinearRgb::new(0.25, 0.5, 0.75));
        assert_eq!(a.mix(0.0, b), a);
    }

    #[test]
    fn srgb_endpoints_survive_conversion() {
        assert_eq!(LinearRgb::from_srgb8(255, 0, 128).to_srgb8(), [255, 0, 128]);
        assert_eq!(LinearRgb::parse_hex("#ffffff").map(|c| c.to_srgb8()), Some([255, 255, 255]));
        assert_eq!(LinearRgb::parse_hex("fff"), None);
    }
}
