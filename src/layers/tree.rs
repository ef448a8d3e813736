// ============================================================================
// LAYER TREE: immutable snapshots with spine-copying updates
// ============================================================================
//
// Every mutation returns a brand-new `LayerTree`.  Only the nodes on the path
// from the root to the edited node are rebuilt; all other subtrees are shared
// with the previous snapshot through `Arc`, so a mutation costs O(depth) and
// old snapshots stay valid for any reader still holding them.
// ============================================================================

use std::sync::Arc;

use super::{CollectedLayer, IdAllocator, Layer, LayerId, LayerKind, LayerPath};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug)]
pub struct LayerTree {
    root: Arc<Layer>,
}

fn invalid(path: &LayerPath, depth: usize) -> EngineError {
    EngineError::InvalidPath {
        path: path.clone(),
        depth,
    }
}

impl LayerTree {
    /// Wrap an existing root. The root must be a group.
    pub fn new(root: Layer) -> EngineResult<Self> {
        if root.is_leaf() {
            return Err(EngineError::NotAGroup(LayerPath::root()));
        }
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// A root group holding a single blank leaf, the default new document.
    pub fn with_single_leaf(ids: &mut IdAllocator) -> Self {
        let root_id = ids.next_id();
        let leaf = Layer::leaf(ids.next_id()).with_name("Background");
        Self {
            root: Arc::new(Layer::group(root_id, vec![leaf]).with_name("Root")),
        }
    }

    pub fn root(&self) -> &Layer {
        &self.root
    }

    /// True when both snapshots share the very same root node.
    pub fn same_snapshot(&self, other: &LayerTree) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// The shared handle of the node at `path`.
    pub fn get_shared(&self, path: &LayerPath) -> EngineResult<&Arc<Layer>> {
        let mut node = &self.root;
        for (depth, &idx) in path.indices().iter().enumerate() {
            node = node.children().get(idx).ok_or_else(|| invalid(path, depth))?;
        }
        Ok(node)
    }

    /// The node at `path`.
    pub fn get(&self, path: &LayerPath) -> EngineResult<&Layer> {
        self.get_shared(path).map(|node| &**node)
    }

    /// Like [`get`](Self::get) but flattens the node, accumulating opacity on
    /// the way down. Once a hidden ancestor is seen the result stays at 0.
    pub fn get_with_context(&self, path: &LayerPath, ambient: f32) -> EngineResult<CollectedLayer> {
        let mut node: &Layer = &self.root;
        let mut opacity = node.effective_opacity(ambient);
        for (depth, &idx) in path.indices().iter().enumerate() {
            node = node
                .children()
                .get(idx)
                .map(|child| &**child)
                .ok_or_else(|| invalid(path, depth))?;
            if opacity > 0.0 {
                opacity = node.effective_opacity(opacity);
            }
        }
        Ok(CollectedLayer {
            id: node.id,
            name: node.name.clone(),
            effective_opacity: opacity,
        })
    }

    /// Depth-first search; the first match in document order wins.
    pub fn find_path(&self, id: LayerId) -> Option<LayerPath> {
        fn search(node: &Layer, id: LayerId, trail: &mut Vec<usize>) -> bool {
            if node.id == id {
                return true;
            }
            for (i, child) in node.children().iter().enumerate() {
                trail.push(i);
                if search(child, id, trail) {
                    return true;
                }
                trail.pop();
            }
            false
        }

        let mut trail = Vec::new();
        search(&self.root, id, &mut trail).then(|| LayerPath::new(trail))
    }

    /// Insert `layer` into the group addressed by `path`'s parent, at `path`'s
    /// trailing index. Existing children at and after that index shift right.
    pub fn insert(&self, path: &LayerPath, layer: Layer) -> EngineResult<LayerTree> {
        let (parent, index) = split_last(path)?;
        self.modify_group(path, &parent, |children| {
            if index > children.len() {
                return Err(invalid(path, path.depth() - 1));
            }
            children.insert(index, Arc::new(layer));
            Ok(())
        })
    }

    /// Remove the node at `path`.
    ///
    /// The returned selection points at a surviving sibling: the previous one
    /// if the removed node was last, otherwise the same index (now the next
    /// sibling). `None` when the parent group was left without children; the
    /// caller has to choose a new selection itself.
    pub fn remove(&self, path: &LayerPath) -> EngineResult<(LayerTree, Option<LayerPath>)> {
        let (parent, index) = split_last(path)?;
        let mut remaining = 0;
        let tree = self.modify_group(path, &parent, |children| {
            if index >= children.len() {
                return Err(invalid(path, path.depth() - 1));
            }
            children.remove(index);
            remaining = children.len();
            Ok(())
        })?;

        let selection = if remaining == 0 {
            None
        } else if index >= remaining {
            Some(path.with_last(remaining - 1))
        } else {
            Some(path.clone())
        };
        Ok((tree, selection))
    }

    /// Replace the node at `path` with `f(node)`.
    pub fn update<F>(&self, path: &LayerPath, f: F) -> EngineResult<LayerTree>
    where
        F: FnOnce(&Layer) -> Layer,
    {
        let root = rebuild(&self.root, path.indices(), 0, path, |node| Ok(f(node)))?;
        Ok(LayerTree {
            root: Arc::new(root),
        })
    }

    /// Every leaf in document order with its effective opacity.
    pub fn leaves(&self) -> Vec<CollectedLayer> {
        let mut out = Vec::with_capacity(self.root.leaf_count());
        self.root.collect_leaves(&mut out, 1.0);
        out
    }

    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    /// Rebuild the spine down to the group at `group_path` and let `edit`
    /// change its child list.
    fn modify_group<E>(&self, path: &LayerPath, group_path: &LayerPath, edit: E) -> EngineResult<LayerTree>
    where
        E: FnOnce(&mut Vec<Arc<Layer>>) -> EngineResult<()>,
    {
        let root = rebuild(&self.root, group_path.indices(), 0, path, |group| {
            let mut children = match &group.kind {
                LayerKind::Group(children) => children.clone(),
                LayerKind::Leaf => return Err(EngineError::NotAGroup(group_path.clone())),
            };
            edit(&mut children)?;
            Ok(group.with_children(children))
        })?;
        Ok(LayerTree {
            root: Arc::new(root),
        })
    }
}

impl Layer {
    /// Copy of this node's fields with a new child list.
    fn with_children(&self, children: Vec<Arc<Layer>>) -> Layer {
        Layer {
            id: self.id,
            name: self.name.clone(),
            opacity: self.opacity,
            is_hidden: self.is_hidden,
            kind: LayerKind::Group(children),
        }
    }
}

fn split_last(path: &LayerPath) -> EngineResult<(LayerPath, usize)> {
    match (path.parent(), path.last()) {
        (Some(parent), Some(index)) => Ok((parent, index)),
        _ => Err(invalid(path, 0)),
    }
}

/// Walk `indices` from `node`, apply `f` at the end and rebuild every node on
/// the way back up. Untouched siblings keep their `Arc`.
fn rebuild<F>(node: &Layer, indices: &[usize], depth: usize, path: &LayerPath, f: F) -> EngineResult<Layer>
where
    F: FnOnce(&Layer) -> EngineResult<Layer>,
{
    let Some((&idx, rest)) = indices.split_first() else {
        return f(node);
    };
    let children = match &node.kind {
        LayerKind::Group(children) => children,
        LayerKind::Leaf => return Err(invalid(path, depth)),
    };
    let child = children.get(idx).ok_or_else(|| invalid(path, depth))?;
    let new_child = rebuild(child, rest, depth + 1, path, f)?;

    let mut new_children = children.clone();
    new_children[idx] = Arc::new(new_child);
    Ok(node.with_children(new_children))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Root: [A, G[B, C], D]
    fn sample() -> (LayerTree, IdAllocator) {
        let mut ids = IdAllocator::new();
        let root_id = ids.next_id();
        let a = Layer::leaf(ids.next_id()).with_name("A");
        let b = Layer::leaf(ids.next_id()).with_name("B");
        let c = Layer::leaf(ids.next_id()).with_name("C");
        let g = Layer::group(ids.next_id(), vec![b, c]).with_name("G");
        let d = Layer::leaf(ids.next_id()).with_name("D");
        let root = Layer::group(root_id, vec![a, g, d]);
        (LayerTree::new(root).unwrap(), ids)
    }

    fn names(tree: &LayerTree) -> Vec<String> {
        tree.leaves().into_iter().map(|l| l.name).collect()
    }

    #[test]
    fn get_descends_and_rejects_bad_paths() {
        let (tree, _) = sample();
        assert_eq!(tree.get(&LayerPath::new(vec![1, 1])).unwrap().name, "C");
        assert!(matches!(
            tree.get(&LayerPath::new(vec![3])),
            Err(EngineError::InvalidPath { depth: 0, .. })
        ));
        // continues past a leaf
        assert!(matches!(
            tree.get(&LayerPath::new(vec![0, 0])),
            Err(EngineError::InvalidPath { depth: 1, .. })
        ));
    }

    #[test]
    fn find_path_runs_root_to_target() {
        let (tree, _) = sample();
        let c = tree.get(&LayerPath::new(vec![1, 1])).unwrap().id;
        assert_eq!(tree.find_path(c), Some(LayerPath::new(vec![1, 1])));
        assert_eq!(tree.find_path(LayerId(999)), None);
    }

    #[test]
    fn get_with_context_short_circuits_on_hidden_ancestor() {
        let (tree, _) = sample();
        let tree = tree
            .update(&LayerPath::new(vec![1]), |g| g.clone().with_hidden(true))
            .unwrap();
        let b = tree.get_with_context(&LayerPath::new(vec![1, 0]), 1.0).unwrap();
        assert_eq!(b.name, "B");
        assert_eq!(b.effective_opacity, 0.0);

        let tree = tree
            .update(&LayerPath::new(vec![2]), |d| d.clone().with_opacity(0.25))
            .unwrap();
        let d = tree.get_with_context(&LayerPath::new(vec![2]), 1.0).unwrap();
        assert_eq!(d.effective_opacity, 0.25);
    }

    #[test]
    fn insert_shifts_right_and_shares_untouched_subtrees() {
        let (tree, mut ids) = sample();
        let new_leaf = Layer::leaf(ids.next_id()).with_name("N");
        let next = tree.insert(&LayerPath::new(vec![1, 1]), new_leaf).unwrap();

        assert_eq!(names(&next), ["A", "B", "N", "C", "D"]);
        assert_eq!(names(&tree), ["A", "B", "C", "D"]);

        let old_a = tree.get_shared(&LayerPath::new(vec![0])).unwrap();
        let new_a = next.get_shared(&LayerPath::new(vec![0])).unwrap();
        assert!(Arc::ptr_eq(old_a, new_a));
        let old_b = tree.get_shared(&LayerPath::new(vec![1, 0])).unwrap();
        let new_b = next.get_shared(&LayerPath::new(vec![1, 0])).unwrap();
        assert!(Arc::ptr_eq(old_b, new_b));
        assert!(!tree.same_snapshot(&next));
    }

    #[test]
    fn insert_into_leaf_is_rejected() {
        let (tree, mut ids) = sample();
        let err = tree
            .insert(&LayerPath::new(vec![0, 0]), Layer::leaf(ids.next_id()))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAGroup(_)));
        let err = tree
            .insert(&LayerPath::new(vec![5]), Layer::leaf(ids.next_id()))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPath { .. }));
    }

    #[test]
    fn remove_last_selects_previous_sibling() {
        let (tree, _) = sample();
        let (next, sel) = tree.remove(&LayerPath::new(vec![2])).unwrap();
        assert_eq!(names(&next), ["A", "B", "C"]);
        assert_eq!(sel, Some(LayerPath::new(vec![1])));
    }

    #[test]
    fn remove_middle_keeps_index() {
        let (tree, _) = sample();
        let (next, sel) = tree.remove(&LayerPath::new(vec![1, 0])).unwrap();
        assert_eq!(names(&next), ["A", "C", "D"]);
        assert_eq!(sel, Some(LayerPath::new(vec![1, 0])));
        assert_eq!(next.get(&LayerPath::new(vec![1, 0])).unwrap().name, "C");
    }

    #[test]
    fn remove_only_child_reports_no_selection() {
        let (tree, _) = sample();
        let (tree, _) = tree.remove(&LayerPath::new(vec![1, 0])).unwrap();
        let (tree, sel) = tree.remove(&LayerPath::new(vec![1, 0])).unwrap();
        assert_eq!(sel, None);
        assert!(tree.get(&LayerPath::new(vec![1])).unwrap().children().is_empty());
    }

    #[test]
    fn removing_root_is_invalid() {
        let (tree, _) = sample();
        assert!(tree.remove(&LayerPath::root()).is_err());
    }

    #[test]
    fn update_rebuilds_only_the_spine() {
        let (tree, _) = sample();
        let next = tree
            .update(&LayerPath::new(vec![1, 1]), |c| c.clone().with_name("C2"))
            .unwrap();
        assert_eq!(names(&next), ["A", "B", "C2", "D"]);
        let old_d = tree.get_shared(&LayerPath::new(vec![2])).unwrap();
        let new_d = next.get_shared(&LayerPath::new(vec![2])).unwrap();
        assert!(Arc::ptr_eq(old_d, new_d));
    }
}
