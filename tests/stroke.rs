use paintfe_engine::color::LinearRgb;
use paintfe_engine::stroke::{
    BrushSettings, PointerSample, StrokeInterpolator, StrokePoint, interpolate,
};
use proptest::prelude::*;

fn brush() -> BrushSettings {
    BrushSettings {
        diameter_px: 20.0,
        spacing_pct: 0.5,
        color: LinearRgb::new(0.8, 0.1, 0.1),
        alpha: 0.6,
        rotation: 0.25,
        ..BrushSettings::default()
    }
}

fn point(x: f32, y: f32, pressure: f32) -> StrokePoint {
    StrokePoint::from_sample(&PointerSample::new(x, y, pressure, 0.0), &brush())
}

#[test]
fn straight_segment_is_stamped_every_spacing() {
    let b = brush();
    let mut start = point(0.0, 0.0, 1.0);
    let end = point(100.0, 0.0, 1.0);
    let mut stamps = Vec::new();
    interpolate(&mut start, &end, &b, &mut stamps);

    assert!((9..=10).contains(&stamps.len()), "{} stamps", stamps.len());
    for (i, stamp) in stamps.iter().enumerate() {
        let expected = 10.0 * (i + 1) as f32;
        assert!((stamp.position.x - expected).abs() < 1e-3, "stamp {} at {}", i, stamp.position.x);
        assert_eq!(stamp.position.y, 0.0);
        assert_eq!(stamp.color, b.color);
        assert_eq!(stamp.alpha, b.alpha);
        assert_eq!(stamp.rotation, b.rotation);
    }
    assert!(start.position.x <= 100.0 + 1e-3);
}

#[test]
fn zero_length_segment_emits_nothing() {
    let mut start = point(5.0, 5.0, 1.0);
    let end = start;
    let mut stamps = Vec::new();
    interpolate(&mut start, &end, &brush(), &mut stamps);
    assert!(stamps.is_empty());
}

#[test]
fn drag_without_click_is_ignored() {
    let mut stroke = StrokeInterpolator::new(0.0);
    let added = stroke.on_drag(&[PointerSample::new(50.0, 50.0, 1.0, 16.0)], &brush());
    assert_eq!(added, 0);
    assert!(stroke.drain_stamps().is_empty());
}

#[test]
fn smoothing_lags_behind_then_catches_up() {
    let b = brush();
    let mut stroke = StrokeInterpolator::new(50.0);
    stroke.on_click(PointerSample::new(0.0, 0.0, 1.0, 0.0), &b);
    assert_eq!(stroke.on_drag(&[PointerSample::new(200.0, 0.0, 1.0, 16.0)], &b), 0);

    let mut last_x = 0.0;
    let mut t = 16.0;
    for _ in 0..120 {
        t += 16.0;
        stroke.on_frame(t, &b);
        if let Some(stamp) = stroke.pending_stamps().last() {
            assert!(stamp.position.x >= last_x);
            last_x = stamp.position.x;
        }
    }
    assert!(last_x > 150.0, "only reached {}", last_x);
}

proptest! {
    #[test]
    fn interpolation_terminates_with_bounded_stamp_count(
        x0 in -500.0f32..500.0, y0 in -500.0f32..500.0,
        x1 in -500.0f32..500.0, y1 in -500.0f32..500.0,
        p0 in 0.0f32..=1.0, p1 in 0.0f32..=1.0,
    ) {
        let b = brush();
        let mut start = point(x0, y0, p0);
        let end = point(x1, y1, p1);
        let distance = start.distance(&end);
        let mut stamps = Vec::new();
        interpolate(&mut start, &end, &b, &mut stamps);

        // never overshoots the segment
        prop_assert!(start.distance(&end) <= distance + 1e-3);
        for stamp in &stamps {
            prop_assert!(stamp.scaled_diameter >= 0.0);
            prop_assert!(stamp.scaled_diameter <= b.diameter_px + 1e-3);
        }
    }

    #[test]
    fn stroke_area_bounds_every_stamp(
        xs in prop::collection::vec((0.0f32..300.0, 0.0f32..300.0, 0.1f32..=1.0), 1..12),
    ) {
        let b = brush();
        let mut stroke = StrokeInterpolator::new(0.0);
        stroke.on_click(PointerSample::new(150.0, 150.0, 1.0, 0.0), &b);
        let samples: Vec<_> = xs
            .iter()
            .enumerate()
            .map(|(i, (x, y, p))| PointerSample::new(*x, *y, *p, (i + 1) as f64 * 16.0))
            .collect();
        stroke.on_drag(&samples, &b);
        let area = stroke.affected_area().unwrap();
        for stamp in stroke.drain_stamps() {
            let r = stamp.bounds();
            prop_assert!(r.min.x >= area.min.x && r.min.y >= area.min.y);
            prop_assert!(r.max.x <= area.max.x && r.max.y <= area.max.y);
        }
    }
}
