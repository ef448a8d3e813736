// ============================================================================
// ENGINE ERRORS
// ============================================================================

use crate::layers::{LayerId, LayerPath};

/// Errors surfaced by the engine's command/query surface.
#[derive(Debug)]
pub enum EngineError {
    /// A path index was out of range at `depth`, or the path continued past
    /// a leaf. Always means the path came from a different tree snapshot.
    InvalidPath { path: LayerPath, depth: usize },
    /// An operation that needs a group (insert target, split parent) hit a leaf.
    NotAGroup(LayerPath),
    /// No layer with this id exists in the current tree.
    LayerNotFound(LayerId),
    /// Painting was requested but the selection is a group.
    NoActiveLayer,
    /// Bad user-supplied value (command line, colour, point list).
    Config(String),
    Io(std::io::Error),
    Image(String),
    Gpu(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidPath { path, depth } => {
                write!(f, "Invalid layer path {} (failed at depth {})", path, depth)
            }
            EngineError::NotAGroup(path) => write!(f, "Layer at {} is not a group", path),
            EngineError::LayerNotFound(id) => write!(f, "Layer {} not found", id),
            EngineError::NoActiveLayer => write!(f, "Selection is a group; nothing to paint on"),
            EngineError::Config(e) => write!(f, "Invalid setting: {}", e),
            EngineError::Io(e) => write!(f, "I/O error: {}", e),
            EngineError::Image(e) => write!(f, "Image error: {}", e),
            EngineError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Image(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
