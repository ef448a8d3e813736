// ============================================================================
// DOCUMENT: command/query surface over the layer tree and the active stroke
// ============================================================================
//
// Holds the current tree snapshot (`Arc<LayerTree>`), the selection path,
// the id counter and the stroke interpolator.  Every command replaces the
// snapshot wholesale; readers holding an older `Arc` keep a consistent view.
//
// Once per frame the host calls `take_frame()` and hands the result to the
// compositor.
// ============================================================================

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::geometry::Rect;
use crate::layers::{
    CollectedLayer, IdAllocator, Layer, LayerId, LayerPath, LayerTree, SplitLayers,
};
use crate::stroke::{BrushBlend, BrushSettings, PointerSample, Stamp, StrokeInterpolator};

/// Stamps produced for one layer since the previous frame.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeFrame {
    pub layer: LayerId,
    pub stamps: Vec<Stamp>,
    pub blend: BrushBlend,
    pub hardness: f32,
    /// The stroke ended; merge it into `layer`.
    pub finished: bool,
}

/// Everything the compositor needs for one frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub tree: Arc<LayerTree>,
    pub selection: LayerPath,
    /// Strokes in the order they happened: every stroke that ended since the
    /// previous frame, then the active one (if any) last.
    pub strokes: Vec<StrokeFrame>,
}

impl Frame {
    /// The stroke still being painted.
    pub fn active_stroke(&self) -> Option<&StrokeFrame> {
        self.strokes.last().filter(|s| !s.finished)
    }
}

pub struct Document {
    id: Uuid,
    ids: IdAllocator,
    tree: Arc<LayerTree>,
    selection: LayerPath,
    brush: BrushSettings,
    stroke: StrokeInterpolator,
    /// Layer the active stroke paints on.
    stroke_layer: Option<LayerId>,
    /// Strokes that ended but have not been handed out by `take_frame`.
    finished: Vec<StrokeFrame>,
}

impl Document {
    /// A root group holding one leaf, which is selected.
    pub fn new(brush: BrushSettings, smoothing_ms: f32) -> Self {
        let mut ids = IdAllocator::new();
        let tree = LayerTree::with_single_leaf(&mut ids);
        let id = Uuid::new_v4();
        crate::log_info!("document {}: created", id);
        Self {
            id,
            ids,
            tree: Arc::new(tree),
            selection: LayerPath::new(vec![0]),
            brush,
            stroke: StrokeInterpolator::new(smoothing_ms),
            stroke_layer: None,
            finished: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tree(&self) -> &LayerTree {
        &self.tree
    }

    /// Shareable handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<LayerTree> {
        Arc::clone(&self.tree)
    }

    pub fn selection(&self) -> &LayerPath {
        &self.selection
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: BrushSettings) {
        self.brush = brush;
    }

    pub fn set_smoothing(&mut self, smoothing_ms: f32) {
        self.stroke.set_smoothing(smoothing_ms);
    }

    pub fn is_painting(&self) -> bool {
        self.stroke.is_active()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The selected layer (leaf or group).
    pub fn current(&self) -> EngineResult<&Layer> {
        self.tree.get(&self.selection)
    }

    /// The selected leaf with its effective opacity; `None` for a group.
    pub fn current_leaf(&self) -> EngineResult<Option<CollectedLayer>> {
        if self.current()?.is_leaf() {
            self.tree.get_with_context(&self.selection, 1.0).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn split(&self) -> EngineResult<SplitLayers> {
        self.tree.split(&self.selection)
    }

    /// Bounds of the current (or most recent) stroke.
    pub fn affected_area(&self) -> Option<Rect> {
        self.stroke.affected_area()
    }

    pub fn path_of(&self, id: LayerId) -> EngineResult<LayerPath> {
        self.tree.find_path(id).ok_or(EngineError::LayerNotFound(id))
    }

    // ------------------------------------------------------------------
    // Layer commands
    // ------------------------------------------------------------------

    /// Add a blank leaf directly after `after` in document order and select it.
    pub fn new_layer(&mut self, after: LayerId) -> EngineResult<LayerId> {
        let layer = Layer::leaf(self.ids.next_id());
        let id = layer.id;
        let path = self.insert_after(after, layer)?;
        self.set_selection(path);
        crate::log_info!("document: new layer {} after {}", id, after);
        Ok(id)
    }

    /// Add a group holding one blank leaf after `after`; the leaf is selected.
    pub fn new_group(&mut self, after: LayerId) -> EngineResult<LayerId> {
        let group_id = self.ids.next_id();
        let leaf = Layer::leaf(self.ids.next_id());
        let path = self.insert_after(after, Layer::group(group_id, vec![leaf]))?;
        self.set_selection(path.child(0));
        crate::log_info!("document: new group {} after {}", group_id, after);
        Ok(group_id)
    }

    /// Remove a layer. No group is ever left empty: removing the only child
    /// of a nested group removes the group too, and removing the root's only
    /// child leaves a fresh blank leaf behind.
    pub fn remove_layer(&mut self, id: LayerId) -> EngineResult<()> {
        let mut path = self.path_of(id)?;
        if path.is_root() {
            return Err(EngineError::InvalidPath { path, depth: 0 });
        }
        self.interrupt_stroke();

        loop {
            let (tree, selection) = self.tree.remove(&path)?;
            if let Some(selection) = selection {
                self.tree = Arc::new(tree);
                self.selection = selection;
                break;
            }
            let parent = path.parent().unwrap_or_else(LayerPath::root);
            if parent.is_root() {
                let blank = Layer::leaf(self.ids.next_id());
                let target = parent.child(0);
                self.tree = Arc::new(tree.insert(&target, blank)?);
                self.selection = target;
                crate::log_info!("document: root emptied, added blank layer");
                break;
            }
            // parent group would be left empty; remove it instead
            path = parent;
        }
        crate::log_info!("document: removed layer {} (selection {})", id, self.selection);
        Ok(())
    }

    pub fn select_layer(&mut self, id: LayerId) -> EngineResult<()> {
        let path = self.path_of(id)?;
        self.set_selection(path);
        Ok(())
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> EngineResult<()> {
        self.update_layer(id, |layer| layer.clone().with_opacity(opacity))
    }

    pub fn set_hidden(&mut self, id: LayerId, hidden: bool) -> EngineResult<()> {
        self.update_layer(id, |layer| layer.clone().with_hidden(hidden))
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> EngineResult<()> {
        self.update_layer(id, |layer| layer.clone().with_name(name))
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    /// Start a stroke on the selected leaf.
    pub fn on_click(&mut self, sample: PointerSample) -> EngineResult<()> {
        let Some(leaf) = self.current_leaf()? else {
            crate::log_warn!("document: click ignored, selection {} is a group", self.selection);
            return Err(EngineError::NoActiveLayer);
        };
        self.interrupt_stroke();
        self.stroke.on_click(sample, &self.brush);
        self.stroke_layer = Some(leaf.id);
        Ok(())
    }

    /// Feed drag samples in arrival order. Returns stamps added.
    pub fn on_drag(&mut self, samples: &[PointerSample]) -> usize {
        let added = self.stroke.on_drag(samples, &self.brush);
        if !self.stroke.is_active() {
            // cancelled
            self.finish_stroke();
        }
        added
    }

    pub fn on_release(&mut self) {
        self.stroke.on_release();
        self.finish_stroke();
    }

    /// Advance pointer smoothing to `now` (ms).
    pub fn on_frame(&mut self, now: f64) -> usize {
        self.stroke.on_frame(now, &self.brush)
    }

    /// Collect this frame's state and stamps.
    pub fn take_frame(&mut self) -> Frame {
        let mut strokes = std::mem::take(&mut self.finished);
        if let Some(layer) = self.stroke_layer {
            strokes.push(self.stroke_frame(layer, false));
        }
        Frame {
            tree: self.snapshot(),
            selection: self.selection.clone(),
            strokes,
        }
    }

    // ------------------------------------------------------------------

    fn insert_after(&mut self, after: LayerId, layer: Layer) -> EngineResult<LayerPath> {
        let anchor = self.path_of(after)?;
        let target = match anchor.last() {
            Some(index) => anchor.with_last(index + 1),
            // after the root: first child
            None => anchor.child(0),
        };
        self.tree = Arc::new(self.tree.insert(&target, layer)?);
        Ok(target)
    }

    fn update_layer<F>(&mut self, id: LayerId, f: F) -> EngineResult<()>
    where
        F: FnOnce(&Layer) -> Layer,
    {
        let path = self.path_of(id)?;
        self.tree = Arc::new(self.tree.update(&path, f)?);
        Ok(())
    }

    fn set_selection(&mut self, path: LayerPath) {
        if path != self.selection {
            self.interrupt_stroke();
        }
        self.selection = path;
    }

    /// End an active stroke so it is merged into the layer it started on.
    fn interrupt_stroke(&mut self) {
        if self.stroke.is_active() {
            crate::log_debug!("document: stroke interrupted by a layer command");
            self.on_release();
        }
    }

    /// Queue the ended stroke, with its undrained stamps, for the next frame.
    fn finish_stroke(&mut self) {
        if let Some(layer) = self.stroke_layer.take() {
            let frame = self.stroke_frame(layer, true);
            self.finished.push(frame);
        }
    }

    fn stroke_frame(&mut self, layer: LayerId, finished: bool) -> StrokeFrame {
        StrokeFrame {
            layer,
            stamps: self.stroke.drain_stamps(),
            blend: self.brush.blend,
            hardness: self.brush.hardness,
            finished,
        }
    }
}
