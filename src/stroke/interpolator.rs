// ============================================================================
// STROKE INTERPOLATOR: sparse pointer samples → evenly spaced brush stamps
// ============================================================================
//
// Idle ──on_click──▶ Active ──on_release / empty on_drag──▶ Idle
//
// While active, `previous_point` is the walking cursor.  Each drag target is
// approached in steps of `spacing * pressure`, so stamp density follows the
// brush size: thin (low pressure) sections get more, smaller stamps.
// ============================================================================

use super::brush::{BrushSettings, PointerSample, Stamp, StrokePoint};
use super::smoothing::PointerSmoother;
use crate::geometry::{self, Rect};

/// Smallest distance at which a segment is considered finished.
pub const MIN_END_SPACING: f32 = 0.05;

/// Memory needed to continue a stroke across frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeState {
    pub previous_point: StrokePoint,
}

#[derive(Debug)]
pub struct StrokeInterpolator {
    state: Option<StrokeState>,
    smoother: PointerSmoother,
    /// Stamps produced since the last `drain_stamps`.
    pending: Vec<Stamp>,
    /// Running bounds of every stamp of the current stroke.
    affected: Option<Rect>,
}

impl StrokeInterpolator {
    /// `smoothing_ms` of 0 feeds drag samples straight to the interpolator.
    pub fn new(smoothing_ms: f32) -> Self {
        Self {
            state: None,
            smoother: PointerSmoother::new(smoothing_ms),
            pending: Vec::new(),
            affected: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&StrokeState> {
        self.state.as_ref()
    }

    pub fn set_smoothing(&mut self, smoothing_ms: f32) {
        self.smoother = PointerSmoother::new(smoothing_ms);
    }

    /// Begin a stroke: exactly one stamp at the click point.
    pub fn on_click(&mut self, sample: PointerSample, brush: &BrushSettings) {
        let point = StrokePoint::from_sample(&sample, brush);
        self.affected = None;
        self.push_stamp(point.to_stamp(brush));
        self.state = Some(StrokeState {
            previous_point: point,
        });
        self.smoother.reset(sample);
        crate::log_debug!(
            "stroke: start at ({:.1}, {:.1}) p={:.2}",
            sample.position.x,
            sample.position.y,
            sample.pressure
        );
    }

    /// Continue the stroke through `samples`, in arrival order.
    ///
    /// Without smoothing every sample is interpolated toward in turn.  With
    /// smoothing only the batch's last sample becomes the smoother's target
    /// and no stamps are added here; `on_frame` walks the cursor toward it.
    /// Whatever lag remains at `on_release` is dropped, so the stroke ends
    /// where the smoothed cursor was, not at the raw pointer.
    ///
    /// An empty batch cancels the stroke.  Returns how many stamps were added.
    pub fn on_drag(&mut self, samples: &[PointerSample], brush: &BrushSettings) -> usize {
        if self.state.is_none() {
            crate::log_warn!("stroke: drag without an active stroke ignored");
            return 0;
        }
        if samples.is_empty() {
            crate::log_warn!("stroke: empty drag batch, cancelling stroke");
            self.end_stroke();
            return 0;
        }

        if self.smoother.is_enabled() {
            if let Some(last) = samples.last() {
                self.smoother.set_target(*last);
            }
            return 0;
        }

        samples
            .iter()
            .map(|sample| self.advance_to(&StrokePoint::from_sample(sample, brush), brush))
            .sum()
    }

    /// Let the smoothing stage move toward the last known pointer position.
    pub fn on_frame(&mut self, now: f64, brush: &BrushSettings) -> usize {
        if self.state.is_none() || !self.smoother.is_enabled() {
            return 0;
        }
        match self.smoother.advance(now) {
            Some(sample) => self.advance_to(&StrokePoint::from_sample(&sample, brush), brush),
            None => 0,
        }
    }

    /// Finish the stroke. No trailing stamp is emitted.
    pub fn on_release(&mut self) {
        if self.state.is_some() {
            crate::log_debug!("stroke: released ({} pending stamps)", self.pending.len());
        }
        self.end_stroke();
    }

    /// Take every stamp produced since the previous call.
    pub fn drain_stamps(&mut self) -> Vec<Stamp> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_stamps(&self) -> &[Stamp] {
        &self.pending
    }

    /// Bounds of everything the current (or last) stroke has touched.
    pub fn affected_area(&self) -> Option<Rect> {
        self.affected
    }

    fn end_stroke(&mut self) {
        self.state = None;
        self.smoother.clear();
    }

    fn advance_to(&mut self, end: &StrokePoint, brush: &BrushSettings) -> usize {
        let Some(state) = self.state.as_mut() else {
            return 0;
        };
        let before = self.pending.len();
        interpolate(&mut state.previous_point, end, brush, &mut self.pending);
        for stamp in &self.pending[before..] {
            geometry::expand(&mut self.affected, stamp.bounds());
        }
        self.pending.len() - before
    }

    fn push_stamp(&mut self, stamp: Stamp) {
        geometry::expand(&mut self.affected, stamp.bounds());
        self.pending.push(stamp);
    }
}

/// Walk `start` toward `end`, appending a stamp at every step.
///
/// `start` is the cursor and is left at the last stamped position, not at
/// `end`, so the residual distance carries into the next call.
pub fn interpolate(start: &mut StrokePoint, end: &StrokePoint, brush: &BrushSettings, out: &mut Vec<Stamp>) {
    let spacing = brush.spacing_px();
    let end_spacing = (spacing * end.pressure).max(MIN_END_SPACING);
    let mut distance = start.distance(end);

    while distance > end_spacing {
        let p = (spacing * start.pressure) / distance;
        if p.is_nan() || p <= 0.0 {
            break;
        }
        *start = start.lerp(end, p.min(1.0));
        distance = start.distance(end);

        let stamp = start.to_stamp(brush);
        if out.last() != Some(&stamp) {
            out.push(stamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::LinearRgb;

    fn brush() -> BrushSettings {
        BrushSettings {
            diameter_px: 20.0,
            spacing_pct: 0.5,
            color: LinearRgb::new(0.2, 0.4, 0.6),
            alpha: 0.8,
            rotation: 0.3,
            ..BrushSettings::default()
        }
    }

    fn point(x: f32, y: f32, pressure: f32) -> StrokePoint {
        StrokePoint::from_sample(&PointerSample::new(x, y, pressure, 0.0), &brush())
    }

    #[test]
    fn constant_pressure_line_is_evenly_spaced() {
        let brush = brush();
        let mut start = point(0.0, 0.0, 1.0);
        let end = point(100.0, 0.0, 1.0);
        let mut out = Vec::new();
        interpolate(&mut start, &end, &brush, &mut out);

        assert!((9..=10).contains(&out.len()), "got {} stamps", out.len());
        for (i, stamp) in out.iter().take(9).enumerate() {
            let expected = 10.0 * (i as f32 + 1.0);
            assert!((stamp.position.x - expected).abs() < 1e-3, "stamp {i} at {}", stamp.position.x);
            assert_eq!(stamp.position.y, 0.0);
            assert_eq!(stamp.color, brush.color);
            assert_eq!(stamp.alpha, brush.alpha);
            assert_eq!(stamp.rotation, brush.rotation);
            assert_eq!(stamp.scaled_diameter, 20.0);
        }
        // cursor keeps the residual distance
        assert!(start.position.x < 100.0 + 1e-3);
        assert!(start.distance(&end) <= 10.0);
    }

    #[test]
    fn zero_length_segment_emits_nothing() {
        let brush = brush();
        let mut start = point(5.0, 5.0, 1.0);
        let end = start;
        let mut out = Vec::new();
        interpolate(&mut start, &end, &brush, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_pressure_cursor_stalls_without_looping() {
        let brush = brush();
        let mut start = point(0.0, 0.0, 0.0);
        let end = point(100.0, 0.0, 0.0);
        let mut out = Vec::new();
        interpolate(&mut start, &end, &brush, &mut out);
        assert!(out.is_empty());
        assert_eq!(start.position.x, 0.0);
    }

    #[test]
    fn lower_pressure_means_more_stamps() {
        let brush = brush();
        let mut light = Vec::new();
        interpolate(&mut point(0.0, 0.0, 0.25), &point(100.0, 0.0, 0.25), &brush, &mut light);
        let mut heavy = Vec::new();
        interpolate(&mut point(0.0, 0.0, 1.0), &point(100.0, 0.0, 1.0), &brush, &mut heavy);
        assert!(light.len() > heavy.len() * 3);
    }

    #[test]
    fn click_drag_release_lifecycle() {
        let brush = brush();
        let mut stroke = StrokeInterpolator::new(0.0);
        assert!(!stroke.is_active());

        stroke.on_click(PointerSample::new(0.0, 0.0, 1.0, 0.0), &brush);
        assert!(stroke.is_active());
        assert_eq!(stroke.drain_stamps().len(), 1);

        let added = stroke.on_drag(
            &[
                PointerSample::new(50.0, 0.0, 1.0, 8.0),
                PointerSample::new(100.0, 0.0, 1.0, 16.0),
            ],
            &brush,
        );
        assert!(added >= 9);
        assert_eq!(stroke.drain_stamps().len(), added);

        let area = stroke.affected_area().unwrap();
        assert_eq!(area.min.x, -10.0);
        assert!(area.max.x > 99.0);

        stroke.on_release();
        assert!(!stroke.is_active());
        assert!(stroke.drain_stamps().is_empty());
        assert_eq!(stroke.on_drag(&[PointerSample::new(0.0, 0.0, 1.0, 20.0)], &brush), 0);
    }

    #[test]
    fn empty_drag_cancels_stroke() {
        let brush = brush();
        let mut stroke = StrokeInterpolator::new(0.0);
        stroke.on_click(PointerSample::new(0.0, 0.0, 1.0, 0.0), &brush);
        stroke.on_drag(&[], &brush);
        assert!(!stroke.is_active());
    }

    #[test]
    fn smoothing_defers_to_frames() {
        let brush = brush();
        let mut stroke = StrokeInterpolator::new(30.0);
        stroke.on_click(PointerSample::new(0.0, 0.0, 1.0, 0.0), &brush);
        stroke.drain_stamps();

        assert_eq!(stroke.on_drag(&[PointerSample::new(200.0, 0.0, 1.0, 1.0)], &brush), 0);
        let mut total = 0;
        let mut now = 0.0;
        for _ in 0..30 {
            now += 16.0;
            total += stroke.on_frame(now, &brush);
        }
        assert!(total > 0);
        let stamps = stroke.drain_stamps();
        assert_eq!(stamps.len(), total);
        assert!(stamps.windows(2).all(|w| w[1].position.x > w[0].position.x));
        assert!(stamps.last().unwrap().position.x > 150.0);
    }

    #[test]
    fn smoothed_drag_follows_last_sample_and_release_drops_lag() {
        let brush = brush();
        let mut stroke = StrokeInterpolator::new(30.0);
        stroke.on_click(PointerSample::new(0.0, 0.0, 1.0, 0.0), &brush);
        stroke.drain_stamps();

        // the detour to y=100 is never visited
        let batch = [
            PointerSample::new(50.0, 100.0, 1.0, 4.0),
            PointerSample::new(100.0, 0.0, 1.0, 8.0),
        ];
        assert_eq!(stroke.on_drag(&batch, &brush), 0);
        stroke.on_frame(16.0, &brush);
        let stamps = stroke.drain_stamps();
        assert!(!stamps.is_empty());
        assert!(stamps.iter().all(|s| s.position.y == 0.0));
        let reached = stamps.last().unwrap().position.x;
        assert!(reached < 100.0);

        stroke.on_release();
        assert_eq!(stroke.on_frame(200.0, &brush), 0);
        assert!(stroke.drain_stamps().is_empty());
    }
}
