// ============================================================================
// SPLIT LAYERS: flatten the tree around the selection for compositing
// ============================================================================
//
// Document order runs top-most first.  Everything before the selection ends
// up in `above`, everything after it in `below`, and the selected leaf is
// `current`.  The compositor blends below → current(+stroke) → above, so the
// two buckets can be cached as single textures while the user paints.
// ============================================================================

use super::{Layer, LayerId, LayerPath, LayerTree};
use crate::error::{EngineError, EngineResult};

/// A leaf projected out of the tree with its effective opacity.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectedLayer {
    pub id: LayerId,
    pub name: String,
    /// Own opacity times every ancestor's, forced to 0 under any hidden node.
    pub effective_opacity: f32,
}

impl CollectedLayer {
    pub fn is_visible(&self) -> bool {
        self.effective_opacity > 0.0
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SplitLayers {
    pub above: Vec<CollectedLayer>,
    /// `None` when the selection is a group; its leaves are then in `below`.
    pub current: Option<CollectedLayer>,
    pub below: Vec<CollectedLayer>,
}

impl SplitLayers {
    pub fn leaf_count(&self) -> usize {
        self.above.len() + self.below.len() + usize::from(self.current.is_some())
    }

    /// `above ++ [current] ++ below`, i.e. document order.
    pub fn document_order(&self) -> impl Iterator<Item = &CollectedLayer> {
        self.above
            .iter()
            .chain(self.current.iter())
            .chain(self.below.iter())
    }
}

impl LayerTree {
    /// Partition the whole tree relative to `selection`.
    ///
    /// At every level along the selection path, earlier siblings are
    /// flattened into `above` and later siblings into `below`, carrying the
    /// opacity of the enclosing groups.
    pub fn split(&self, selection: &LayerPath) -> EngineResult<SplitLayers> {
        let mut split = SplitLayers::default();
        let mut trailing: Vec<(&[std::sync::Arc<Layer>], f32)> = Vec::new();

        let mut node: &Layer = self.root();
        let mut ambient = node.effective_opacity(1.0);
        for (depth, &idx) in selection.indices().iter().enumerate() {
            let children = node.children();
            if idx >= children.len() {
                return Err(EngineError::InvalidPath {
                    path: selection.clone(),
                    depth,
                });
            }
            for sibling in &children[..idx] {
                sibling.collect_leaves(&mut split.above, ambient);
            }
            trailing.push((&children[idx + 1..], ambient));

            node = &*children[idx];
            ambient = node.effective_opacity(ambient);
        }

        if node.is_leaf() {
            split.current = Some(self.get_with_context(selection, 1.0)?);
        } else {
            // `ambient` already includes the group's own opacity.
            for child in node.children() {
                child.collect_leaves(&mut split.below, ambient);
            }
        }

        // Innermost level first so `below` stays in document order.
        for (siblings, ambient) in trailing.into_iter().rev() {
            for sibling in siblings {
                sibling.collect_leaves(&mut split.below, ambient);
            }
        }
        Ok(split)
    }
}
