//! Layer compositing and stroke engine of a raster painting tool.
//!
//! * [`layers`]: persistent layer tree, path addressing, split for compositing
//! * [`stroke`]: pointer samples → evenly spaced brush stamps
//! * [`gpu`]: capability trait, texture slot manager, CPU and wgpu backends
//! * [`compositor`]: per-frame blending of the split layers and the live stroke
//! * [`document`] / [`project`]: command surface and session wrapper
#![allow(clippy::type_complexity)]

pub mod logger;

pub mod cli;
pub mod color;
pub mod compositor;
pub mod document;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod layers;
pub mod project;
pub mod settings;
pub mod stroke;

pub use compositor::{Compositor, FrameStats};
pub use document::{Document, Frame, StrokeFrame};
pub use error::{EngineError, EngineResult};
pub use layers::{Layer, LayerId, LayerKind, LayerPath, LayerTree, SplitLayers};
pub use project::Project;
pub use settings::EngineSettings;
