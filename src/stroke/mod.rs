// ============================================================================
// STROKE MODULE: brush settings, pointer smoothing and stamp interpolation
// ============================================================================
//
//   brush.rs       : BrushSettings, PointerSample, Stamp, StrokePoint
//   smoothing.rs   : time-based follow of the raw pointer ("delay")
//   interpolator.rs: StrokeInterpolator state machine + `interpolate`
// ============================================================================

pub mod brush;
pub mod interpolator;
pub mod smoothing;

pub use brush::{BrushBlend, BrushSettings, PointerSample, Stamp, StrokePoint};
pub use interpolator::{StrokeInterpolator, StrokeState, interpolate};
pub use smoothing::PointerSmoother;
