// ============================================================================
// POINTER SMOOTHING: time-based follow of the raw pointer
// ============================================================================
//
// A lagging cursor chases the latest raw sample with an exponential approach
// (time constant `time_constant_ms`).  Because the approach is driven by the
// frame clock rather than by input events, the stroke keeps moving smoothly
// between sparse samples and settles on the pointer when it stops.
// ============================================================================

use super::brush::PointerSample;

#[derive(Clone, Debug)]
pub struct PointerSmoother {
    time_constant_ms: f32,
    cursor: Option<PointerSample>,
    target: Option<PointerSample>,
}

/// Below this distance the cursor is considered to have arrived.
const SETTLE_DISTANCE: f32 = 0.01;

impl PointerSmoother {
    pub fn new(time_constant_ms: f32) -> Self {
        Self {
            time_constant_ms: time_constant_ms.max(0.0),
            cursor: None,
            target: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.time_constant_ms > 0.0
    }

    pub fn time_constant_ms(&self) -> f32 {
        self.time_constant_ms
    }

    /// Start following from `sample`.
    pub fn reset(&mut self, sample: PointerSample) {
        self.cursor = Some(sample);
        self.target = Some(sample);
    }

    pub fn clear(&mut self) {
        self.cursor = None;
        self.target = None;
    }

    /// Record the newest raw position to chase.
    pub fn set_target(&mut self, sample: PointerSample) {
        self.target = Some(sample);
    }

    /// Advance the cursor to `now` (ms). Returns the new cursor position, or
    /// `None` when there is nothing to do (idle, settled, or clock not moving).
    pub fn advance(&mut self, now: f64) -> Option<PointerSample> {
        let (cursor, target) = (self.cursor?, self.target?);
        let dt = (now - cursor.time) as f32;
        if dt <= 0.0 || cursor.position.distance(target.position) < SETTLE_DISTANCE {
            return None;
        }

        let k = 1.0 - (-dt / self.time_constant_ms).exp();
        let next = PointerSample {
            position: cursor.position.lerp(target.position, k),
            pressure: cursor.pressure + (target.pressure - cursor.pressure) * k,
            time: now,
        };
        self.cursor = Some(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_approaches_target_monotonically() {
        let mut s = PointerSmoother::new(50.0);
        s.reset(PointerSample::new(0.0, 0.0, 1.0, 0.0));
        s.set_target(PointerSample::new(100.0, 0.0, 1.0, 5.0));

        let a = s.advance(16.0).unwrap();
        let b = s.advance(32.0).unwrap();
        assert!(a.position.x > 0.0 && a.position.x < 100.0);
        assert!(b.position.x > a.position.x && b.position.x < 100.0);
        // same timestamp again: nothing new
        assert!(s.advance(32.0).is_none());
    }

    #[test]
    fn idle_smoother_yields_nothing() {
        let mut s = PointerSmoother::new(50.0);
        assert!(s.advance(100.0).is_none());
    }
}
