// ============================================================================
// GEOMETRY: canvas-space points, sizes and rectangles
// ============================================================================

/// A point or offset in canvas space (pixels, y down).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Pixel dimensions of a texture or canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The full-canvas rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }
}

/// Axis-aligned rectangle stored as min/max corners.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: Vec2::new(min_x, min_y),
            max: Vec2::new(max_x, max_y),
        }
    }

    /// Square of side `2 * radius` centred on `center`.
    pub fn around(center: Vec2, radius: f32) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )
    }

    pub fn width(&self) -> f32 {
        (self.max.x - self.min.x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.max.y - self.min.y).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min.x.min(other.min.x),
            self.min.y.min(other.min.y),
            self.max.x.max(other.max.x),
            self.max.y.max(other.max.y),
        )
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        )
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Clamp to `size` and snap outward to whole pixels.
    ///
    /// Returns `(x, y, w, h)`; `w`/`h` are zero when nothing is left.
    pub fn to_pixels(&self, size: Size) -> (u32, u32, u32, u32) {
        let x0 = self.min.x.floor().clamp(0.0, size.width as f32) as u32;
        let y0 = self.min.y.floor().clamp(0.0, size.height as f32) as u32;
        let x1 = self.max.x.ceil().clamp(0.0, size.width as f32) as u32;
        let y1 = self.max.y.ceil().clamp(0.0, size.height as f32) as u32;
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// Grow an optional running rectangle to include `rect`.
pub fn expand(acc: &mut Option<Rect>, rect: Rect) {
    *acc = Some(match acc {
        Some(existing) => existing.union(&rect),
        None => rect,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tracks_min_max_bounds() {
        let mut acc = None;
        expand(&mut acc, Rect::around(Vec2::new(10.0, 10.0), 2.0));
        expand(&mut acc, Rect::around(Vec2::new(30.0, 5.0), 1.0));
        assert_eq!(acc, Some(Rect::new(8.0, 4.0, 31.0, 12.0)));
    }

    #[test]
    fn to_pixels_clamps_and_snaps_outward() {
        let r = Rect::new(-3.5, 2.2, 10.1, 500.0);
        assert_eq!(r.to_pixels(Size::new(64, 64)), (0, 2, 11, 62));
        assert_eq!(Rect::new(70.0, 70.0, 80.0, 80.0).to_pixels(Size::new(64, 64)).2, 0);
    }
}
