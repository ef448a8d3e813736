// ============================================================================
// LAYERS: persistent layer tree, path addressing and draw-order splitting
// ============================================================================
//
//   path.rs : LayerPath (child indices from the root)
//   tree.rs : LayerTree: lookup, search, spine-copying insert/remove/update
//   split.rs: CollectedLayer / SplitLayers: flattening for compositing
// ============================================================================

pub mod path;
pub mod split;
pub mod tree;

pub use path::LayerPath;
pub use split::{CollectedLayer, SplitLayers};
pub use tree::LayerTree;

use std::sync::Arc;

/// Process-unique layer identity. Never reused within a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id counter, owned by the document and threaded through every
/// call that creates layers.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> LayerId {
        let id = LayerId(self.next);
        self.next += 1;
        id
    }

    /// How many ids have been handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Variant-specific part of a layer.
///
/// Children are `Arc`-shared so that a rebuilt tree reuses every subtree the
/// mutation did not touch.
#[derive(Clone, Debug)]
pub enum LayerKind {
    Leaf,
    Group(Vec<Arc<Layer>>),
}

/// A node of the layer tree.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub opacity: f32,
    pub is_hidden: bool,
    pub kind: LayerKind,
}

impl Layer {
    /// A fresh, fully opaque, visible leaf.
    pub fn leaf(id: LayerId) -> Self {
        Self {
            id,
            name: format!("Layer {}", id.0),
            opacity: 1.0,
            is_hidden: false,
            kind: LayerKind::Leaf,
        }
    }

    /// A group owning `children` in document order.
    pub fn group(id: LayerId, children: Vec<Layer>) -> Self {
        Self {
            id,
            name: format!("Group {}", id.0),
            opacity: 1.0,
            is_hidden: false,
            kind: LayerKind::Group(children.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.is_hidden = hidden;
        self
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, LayerKind::Leaf)
    }

    /// Children in document order; empty for a leaf.
    pub fn children(&self) -> &[Arc<Layer>] {
        match &self.kind {
            LayerKind::Leaf => &[],
            LayerKind::Group(children) => children,
        }
    }

    /// Opacity this node contributes under `ambient`, zero when hidden.
    pub fn effective_opacity(&self, ambient: f32) -> f32 {
        if self.is_hidden { 0.0 } else { ambient * self.opacity }
    }

    /// Depth-first accumulation of every leaf under (and including) this node.
    pub fn collect_leaves(&self, into: &mut Vec<CollectedLayer>, ambient: f32) {
        let opacity = self.effective_opacity(ambient);
        match &self.kind {
            LayerKind::Leaf => into.push(CollectedLayer {
                id: self.id,
                name: self.name.clone(),
                effective_opacity: opacity,
            }),
            LayerKind::Group(children) => {
                for child in children {
                    child.collect_leaves(into, opacity);
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match &self.kind {
            LayerKind::Leaf => 1,
            LayerKind::Group(children) => children.iter().map(|c| c.leaf_count()).sum(),
        }
    }
}
