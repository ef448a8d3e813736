use std::sync::Arc;

use paintfe_engine::layers::{IdAllocator, Layer, LayerPath, LayerTree};
use proptest::prelude::*;
use proptest::sample::Index;

/// Tree shape without ids; ids are assigned when the tree is built.
#[derive(Clone, Debug)]
enum Shape {
    Leaf { opacity: f32, hidden: bool },
    Group { opacity: f32, hidden: bool, children: Vec<Shape> },
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = (0.0f32..=1.0, prop::bool::weighted(0.2))
        .prop_map(|(opacity, hidden)| Shape::Leaf { opacity, hidden });
    leaf.prop_recursive(4, 48, 4, |inner| {
        (0.0f32..=1.0, prop::bool::weighted(0.2), prop::collection::vec(inner, 1..4)).prop_map(
            |(opacity, hidden, children)| Shape::Group {
                opacity,
                hidden,
                children,
            },
        )
    })
}

fn build(shape: &Shape, ids: &mut IdAllocator) -> Layer {
    match shape {
        Shape::Leaf { opacity, hidden } => Layer::leaf(ids.next_id())
            .with_opacity(*opacity)
            .with_hidden(*hidden),
        Shape::Group {
            opacity,
            hidden,
            children,
        } => {
            let id = ids.next_id();
            let children = children.iter().map(|c| build(c, ids)).collect();
            Layer::group(id, children).with_opacity(*opacity).with_hidden(*hidden)
        }
    }
}

fn tree() -> impl Strategy<Value = LayerTree> {
    prop::collection::vec(shape(), 1..5).prop_map(|shapes| {
        let mut ids = IdAllocator::new();
        let root = ids.next_id();
        let children = shapes.iter().map(|s| build(s, &mut ids)).collect();
        LayerTree::new(Layer::group(root, children)).unwrap()
    })
}

/// Every non-root node path, depth first.
fn node_paths(tree: &LayerTree) -> Vec<LayerPath> {
    fn walk(node: &Layer, path: LayerPath, out: &mut Vec<LayerPath>) {
        for (i, child) in node.children().iter().enumerate() {
            let p = path.child(i);
            out.push(p.clone());
            walk(child, p, out);
        }
    }
    let mut out = Vec::new();
    walk(tree.root(), LayerPath::root(), &mut out);
    out
}

fn leaf_paths(tree: &LayerTree) -> Vec<LayerPath> {
    node_paths(tree)
        .into_iter()
        .filter(|p| tree.get(p).unwrap().is_leaf())
        .collect()
}

fn has_hidden_ancestor(tree: &LayerTree, path: &LayerPath) -> bool {
    let mut node = tree.root();
    if node.is_hidden {
        return true;
    }
    for &i in &path.indices()[..path.depth() - 1] {
        node = &node.children()[i];
        if node.is_hidden {
            return true;
        }
    }
    false
}

proptest! {
    #[test]
    fn hidden_ancestor_zeroes_effective_opacity(tree in tree()) {
        for path in leaf_paths(&tree) {
            if has_hidden_ancestor(&tree, &path) {
                let leaf = tree.get_with_context(&path, 1.0).unwrap();
                prop_assert_eq!(leaf.effective_opacity, 0.0);
            }
        }
    }

    #[test]
    fn effective_opacity_never_exceeds_own(tree in tree()) {
        for path in leaf_paths(&tree) {
            let own = tree.get(&path).unwrap().opacity;
            let collected = tree.get_with_context(&path, 1.0).unwrap();
            prop_assert!(collected.effective_opacity <= own + f32::EPSILON);
        }
    }

    #[test]
    fn split_covers_every_leaf_in_document_order(tree in tree()) {
        let order: Vec<_> = tree.leaves().into_iter().map(|l| l.id).collect();
        for path in node_paths(&tree) {
            let split = tree.split(&path).unwrap();
            prop_assert_eq!(split.leaf_count(), tree.leaf_count());

            let ids: Vec<_> = split.document_order().map(|l| l.id).collect();
            prop_assert_eq!(&ids, &order);
            prop_assert_eq!(split.current.is_some(), tree.get(&path).unwrap().is_leaf());
        }
    }

    #[test]
    fn split_opacities_match_flat_listing(tree in tree()) {
        let flat = tree.leaves();
        for path in leaf_paths(&tree) {
            let split = tree.split(&path).unwrap();
            for (a, b) in split.document_order().zip(flat.iter()) {
                prop_assert!((a.effective_opacity - b.effective_opacity).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn remove_then_reinsert_restores_leaf_sequence(tree in tree(), pick in any::<Index>()) {
        let paths = leaf_paths(&tree);
        let path = pick.get(&paths[..]).clone();
        let removed = tree.get(&path).unwrap().clone();

        let (without, selection) = tree.remove(&path).unwrap();
        prop_assert_eq!(without.leaf_count(), tree.leaf_count() - 1);
        prop_assert!(without.find_path(removed.id).is_none());
        if let Some(selection) = &selection {
            prop_assert!(without.get(selection).is_ok());
        }

        let restored = without.insert(&path, removed).unwrap();
        let before: Vec<_> = tree.leaves().into_iter().map(|l| l.id).collect();
        let after: Vec<_> = restored.leaves().into_iter().map(|l| l.id).collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn update_shares_untouched_subtrees(tree in tree(), pick in any::<Index>()) {
        let paths = node_paths(&tree);
        let path = pick.get(&paths[..]).clone();
        let updated = tree.update(&path, |l| l.clone().with_name("edited")).unwrap();

        prop_assert_eq!(updated.get(&path).unwrap().name.as_str(), "edited");
        prop_assert!(!updated.same_snapshot(&tree));
        for other in node_paths(&tree) {
            let on_spine = path.indices().starts_with(other.indices());
            let below_target = other.indices().starts_with(path.indices());
            if !on_spine && !below_target {
                let (a, b) = (tree.get_shared(&other).unwrap(), updated.get_shared(&other).unwrap());
                prop_assert!(Arc::ptr_eq(a, b), "{} was copied", other);
            }
        }
    }

    #[test]
    fn find_path_locates_every_node(tree in tree()) {
        for path in node_paths(&tree) {
            let id = tree.get(&path).unwrap().id;
            prop_assert_eq!(tree.find_path(id), Some(path));
        }
    }
}

/// Root: [G[A, B, C]]
fn abc() -> (LayerTree, LayerPath) {
    let mut ids = IdAllocator::new();
    let root = ids.next_id();
    let group_id = ids.next_id();
    let children = ["A", "B", "C"]
        .iter()
        .map(|name| Layer::leaf(ids.next_id()).with_name(*name))
        .collect();
    let group = Layer::group(group_id, children);
    (
        LayerTree::new(Layer::group(root, vec![group])).unwrap(),
        LayerPath::new(vec![0]),
    )
}

#[test]
fn removing_last_child_selects_previous_sibling() {
    let (tree, group) = abc();
    let (tree, selection) = tree.remove(&group.child(2)).unwrap();
    let selection = selection.unwrap();
    assert_eq!(selection, group.child(1));
    assert_eq!(tree.get(&selection).unwrap().name, "B");
}

#[test]
fn removing_middle_child_keeps_index_on_next_sibling() {
    let (tree, group) = abc();
    let (tree, selection) = tree.remove(&group.child(1)).unwrap();
    let selection = selection.unwrap();
    assert_eq!(selection, group.child(1));
    assert_eq!(tree.get(&selection).unwrap().name, "C");
}

#[test]
fn out_of_range_paths_are_errors() {
    let (tree, group) = abc();
    assert!(tree.get(&group.child(3)).is_err());
    assert!(tree.split(&LayerPath::new(vec![4])).is_err());
    assert!(tree.remove(&group.child(7)).is_err());
    assert!(tree.insert(&group.child(5), Layer::leaf(IdAllocator::new().next_id())).is_err());
}
