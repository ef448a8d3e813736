// ============================================================================
// COMPOSITOR: layer tree + stroke stamps → visible canvas
// ============================================================================
//
// Render targets (all canvas-sized, created once):
//   above  : every leaf in `split.above`, pre-blended
//   below  : every leaf in `split.below`, pre-blended
//   stroke : stamps of the active stroke, accumulated with Normal blend
//   work   : current layer + stroke using the brush blend (live preview)
//
// Output = below → current (or work) → above.  While painting only the
// stroke changes, so the buckets stay cached and the output is recomposited
// under a scissor covering just the new stamps.  When the stroke ends it is
// merged into the layer's own texture with the brush blend.
//
// Layer textures are created on first reference and live until `destroy`.
// ============================================================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::color::LinearRgb;
use crate::document::{Frame, StrokeFrame};
use crate::error::EngineResult;
use crate::geometry::{self, Rect, Size};
use crate::gpu::{BlendFactors, GpuContext, RenderTarget, TextureCache, TextureId};
use crate::layers::{CollectedLayer, LayerId, LayerPath, LayerTree, SplitLayers};
use crate::stroke::BrushBlend;

/// Side of the debug highlight blocks, in pixels.
pub const DEBUG_BLOCK_SIZE: u32 = 64;

const DEBUG_TINT: LinearRgb = LinearRgb::new(1.0, 0.0, 1.0);
const DEBUG_TINT_ALPHA: f32 = 0.2;

/// What a call to `render` actually did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub split_recomputed: bool,
    pub above_redrawn: bool,
    pub below_redrawn: bool,
    /// Layer textures drawn into buckets or the output.
    pub layers_drawn: usize,
    pub stamps_drawn: usize,
    pub stroke_merged: bool,
    /// Output region recomposited; `None` on an idle frame.
    pub output_region: Option<Rect>,
    /// Debug blocks tinted this frame.
    pub debug_blocks: usize,
}

impl FrameStats {
    pub fn is_idle(&self) -> bool {
        self.output_region.is_none()
    }
}

/// Fixed scratch targets.
#[derive(Debug, Clone, Copy)]
struct Targets {
    above: TextureId,
    below: TextureId,
    stroke: TextureId,
    work: TextureId,
}

pub struct Compositor {
    size: Size,
    cache: TextureCache,
    targets: Targets,
    layer_textures: HashMap<LayerId, TextureId>,

    last_tree: Option<Arc<LayerTree>>,
    last_selection: Option<LayerPath>,
    split: SplitLayers,
    /// Layers whose pixels changed outside of a stroke merge.
    dirty_layers: HashSet<LayerId>,
    /// Output needs a full recomposite next frame.
    full_redraw: bool,

    /// Layer the stroke texture currently belongs to.
    stroke_layer: Option<LayerId>,
    /// Bounds of everything in the stroke texture.
    stroke_area: Option<Rect>,
    stroke_blend: BrushBlend,

    debug_blocks: bool,
}

impl Compositor {
    /// `units` caps the slot pool; the backend's own unit count caps it too.
    pub fn new(gpu: &mut dyn GpuContext, size: Size, units: usize) -> Self {
        let units = units.clamp(1, gpu.max_texture_units().max(1));
        let mut cache = TextureCache::new(units);
        let targets = Targets {
            above: cache.create_texture_with_framebuffer(gpu, size),
            below: cache.create_texture_with_framebuffer(gpu, size),
            stroke: cache.create_texture_with_framebuffer(gpu, size),
            work: cache.create_texture_with_framebuffer(gpu, size),
        };
        crate::log_info!(
            "compositor: {}x{} canvas, {} texture units",
            size.width,
            size.height,
            units
        );
        Self {
            size,
            cache,
            targets,
            layer_textures: HashMap::new(),
            last_tree: None,
            last_selection: None,
            split: SplitLayers::default(),
            dirty_layers: HashSet::new(),
            full_redraw: true,
            stroke_layer: None,
            stroke_area: None,
            stroke_blend: BrushBlend::Normal,
            debug_blocks: false,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_debug_blocks(&mut self, enabled: bool) {
        if self.debug_blocks != enabled {
            self.debug_blocks = enabled;
            self.full_redraw = true;
        }
    }

    /// The split used by the last rendered frame.
    pub fn split(&self) -> &SplitLayers {
        &self.split
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.cache
    }

    /// Texture backing `id`, if it has been referenced yet.
    pub fn layer_texture(&self, id: LayerId) -> Option<TextureId> {
        self.layer_textures.get(&id).copied()
    }

    /// Force the next frame to recomposite everything.
    pub fn invalidate(&mut self) {
        self.full_redraw = true;
    }

    /// Overwrite a layer's pixels with a solid colour.
    pub fn fill_layer(&mut self, gpu: &mut dyn GpuContext, id: LayerId, color: LinearRgb, alpha: f32) {
        let tex = self.ensure_layer_texture(gpu, id);
        self.cache.render_to(gpu, tex);
        gpu.set_scissor(None);
        gpu.set_blend(BlendFactors::REPLACE);
        gpu.fill_rect(self.size.rect(), color, alpha.clamp(0.0, 1.0));
        self.dirty_layers.insert(id);
        self.full_redraw = true;
        crate::log_info!("compositor: filled layer {}", id);
    }

    /// Produce the visible canvas for `frame`.
    pub fn render(&mut self, gpu: &mut dyn GpuContext, frame: Frame) -> EngineResult<FrameStats> {
        let mut stats = FrameStats::default();
        let mut region: Option<Rect> = None;

        // 1. split
        let tree_changed = match &self.last_tree {
            Some(last) => !last.same_snapshot(&frame.tree),
            None => true,
        };
        let selection_changed = self.last_selection.as_ref() != Some(&frame.selection);
        let mut above_changed = false;
        let mut below_changed = false;
        if tree_changed || selection_changed {
            let split = frame.tree.split(&frame.selection)?;
            above_changed = split.above != self.split.above;
            below_changed = split.below != self.split.below;
            if split != self.split {
                self.full_redraw = true;
            }
            self.split = split;
            self.last_tree = Some(Arc::clone(&frame.tree));
            self.last_selection = Some(frame.selection.clone());
            stats.split_recomputed = true;
        }

        // 2. buckets
        let touches_dirty =
            |bucket: &[CollectedLayer], dirty: &HashSet<LayerId>| bucket.iter().any(|l| dirty.contains(&l.id));
        if above_changed || touches_dirty(&self.split.above, &self.dirty_layers) {
            let members = self.split.above.clone();
            stats.layers_drawn += self.redraw_bucket(gpu, self.targets.above, &members);
            stats.above_redrawn = true;
            self.full_redraw = true;
        }
        if below_changed || touches_dirty(&self.split.below, &self.dirty_layers) {
            let members = self.split.below.clone();
            stats.layers_drawn += self.redraw_bucket(gpu, self.targets.below, &members);
            stats.below_redrawn = true;
            self.full_redraw = true;
        }
        if let Some(current) = &self.split.current
            && self.dirty_layers.contains(&current.id)
        {
            self.full_redraw = true;
        }
        self.dirty_layers.clear();

        // 3. stroke stamps, oldest stroke first
        for stroke in &frame.strokes {
            if let Some(area) = self.paint_stroke(gpu, &frame.tree, stroke) {
                stats.stamps_drawn += stroke.stamps.len();
                geometry::expand(&mut region, area);
            }
            if stroke.finished
                && let Some(area) = self.merge_stroke(gpu, &frame.tree)
            {
                geometry::expand(&mut region, area);
                stats.stroke_merged = true;
            }
        }

        // 4. output
        if self.full_redraw {
            region = Some(self.size.rect());
        }
        let Some(mut region) = region else {
            return Ok(stats);
        };
        if self.debug_blocks {
            region = snap_to_blocks(region, self.size);
        }
        stats.layers_drawn += self.composite_output(gpu, region, frame.active_stroke());
        if self.debug_blocks {
            stats.debug_blocks = self.draw_debug_blocks(gpu, region);
        }
        self.full_redraw = false;
        stats.output_region = Some(region);
        Ok(stats)
    }

    /// Release every texture. The compositor must not be used afterwards.
    pub fn destroy(&mut self, gpu: &mut dyn GpuContext) {
        crate::log_debug!("compositor: destroying {} textures", self.cache.len());
        self.cache.destroy_all(gpu);
        self.layer_textures.clear();
        self.last_tree = None;
        self.last_selection = None;
    }

    fn ensure_layer_texture(&mut self, gpu: &mut dyn GpuContext, id: LayerId) -> TextureId {
        if let Some(tex) = self.layer_textures.get(&id) {
            return *tex;
        }
        let tex = self.cache.create_texture_with_framebuffer(gpu, self.size);
        self.layer_textures.insert(id, tex);
        tex
    }

    /// Clear `target` and draw `members` into it bottom-up.
    fn redraw_bucket(&mut self, gpu: &mut dyn GpuContext, target: TextureId, members: &[CollectedLayer]) -> usize {
        let mut drawn = 0;
        // make sure every member has a texture before binding the target
        let textures: Vec<(TextureId, f32)> = members
            .iter()
            .rev()
            .filter(|layer| layer.is_visible())
            .map(|layer| (self.ensure_layer_texture(gpu, layer.id), layer.effective_opacity))
            .collect();

        self.cache.render_to(gpu, target);
        gpu.set_scissor(None);
        gpu.clear();
        gpu.set_blend(BlendFactors::NORMAL);
        for (tex, opacity) in textures {
            let unit = self.cache.bind(gpu, tex);
            gpu.draw_texture(unit, opacity);
            drawn += 1;
        }
        drawn
    }

    /// Accumulate the frame's stamps into the stroke texture. Returns the
    /// area that changed.
    fn paint_stroke(&mut self, gpu: &mut dyn GpuContext, tree: &LayerTree, stroke: &StrokeFrame) -> Option<Rect> {
        let mut changed = None;
        if let Some(previous) = self.stroke_layer
            && previous != stroke.layer
        {
            // commit what another layer left in the scratch texture
            crate::log_warn!("compositor: stroke on layer {} was never finished, merging it", previous);
            changed = self.merge_stroke(gpu, tree);
        }
        self.stroke_layer = Some(stroke.layer);
        self.stroke_blend = stroke.blend;
        if stroke.stamps.is_empty() {
            return changed;
        }

        let mut painted = None;
        for stamp in &stroke.stamps {
            geometry::expand(&mut painted, stamp.bounds());
        }
        self.cache.render_to(gpu, self.targets.stroke);
        gpu.set_scissor(None);
        gpu.set_blend(BlendFactors::NORMAL);
        gpu.draw_stamps(&stroke.stamps, stroke.hardness);
        if let Some(area) = painted {
            geometry::expand(&mut self.stroke_area, area);
            geometry::expand(&mut changed, area);
        }
        changed
    }

    /// Blend the scratch texture into the stroke's layer and reset it.
    /// Returns the merged area, `None` when nothing was merged.
    fn merge_stroke(&mut self, gpu: &mut dyn GpuContext, tree: &LayerTree) -> Option<Rect> {
        let layer = self.stroke_layer.take()?;
        let area = self.stroke_area.take()?;

        if tree.find_path(layer).is_none() {
            crate::log_warn!("compositor: stroke layer {} no longer exists, dropped", layer);
            // the preview may still be on screen
            self.full_redraw = true;
            self.clear_stroke_texture(gpu);
            return None;
        }

        let layer_tex = self.ensure_layer_texture(gpu, layer);
        let unit = self.cache.bind(gpu, self.targets.stroke);
        self.cache.render_to(gpu, layer_tex);
        gpu.set_scissor(Some(area));
        gpu.set_blend(self.stroke_blend.into());
        gpu.draw_texture(unit, 1.0);

        self.clear_stroke_texture(gpu);
        crate::log_debug!("compositor: merged stroke into layer {}", layer);
        Some(area)
    }

    fn clear_stroke_texture(&mut self, gpu: &mut dyn GpuContext) {
        self.cache.render_to(gpu, self.targets.stroke);
        gpu.set_scissor(None);
        gpu.clear();
    }

    /// Recomposite the output under `region`. Returns layers drawn.
    fn composite_output(&mut self, gpu: &mut dyn GpuContext, region: Rect, stroke: Option<&StrokeFrame>) -> usize {
        let current = self.split.current.clone();
        let previewing = match (&current, stroke) {
            (Some(c), Some(s)) => self.stroke_layer == Some(c.id) && s.layer == c.id,
            _ => false,
        };

        // current layer, with the live stroke folded in when painting
        let current_tex = match &current {
            Some(c) if c.is_visible() => {
                let layer_tex = self.ensure_layer_texture(gpu, c.id);
                if previewing {
                    let blend = self.stroke_blend;
                    let layer_unit = self.cache.bind(gpu, layer_tex);
                    self.cache.render_to(gpu, self.targets.work);
                    gpu.set_scissor(Some(region));
                    gpu.clear();
                    gpu.set_blend(BlendFactors::NORMAL);
                    gpu.draw_texture(layer_unit, 1.0);
                    let stroke_unit = self.cache.bind(gpu, self.targets.stroke);
                    gpu.set_blend(blend.into());
                    gpu.draw_texture(stroke_unit, 1.0);
                    Some((self.targets.work, c.effective_opacity))
                } else {
                    Some((layer_tex, c.effective_opacity))
                }
            }
            _ => None,
        };

        let mut drawn = 0;
        let mut passes: Vec<(TextureId, f32)> = Vec::with_capacity(3);
        if self.split.below.iter().any(CollectedLayer::is_visible) {
            passes.push((self.targets.below, 1.0));
        }
        if let Some(pass) = current_tex {
            passes.push(pass);
            drawn += 1;
        }
        if self.split.above.iter().any(CollectedLayer::is_visible) {
            passes.push((self.targets.above, 1.0));
        }

        gpu.bind_framebuffer(RenderTarget::Screen);
        gpu.set_scissor(Some(region));
        gpu.clear();
        gpu.set_blend(BlendFactors::NORMAL);
        for (tex, opacity) in passes {
            let unit = self.cache.bind(gpu, tex);
            gpu.draw_texture(unit, opacity);
        }
        drawn
    }

    /// Tint every debug block inside the block-aligned `region`.
    fn draw_debug_blocks(&self, gpu: &mut dyn GpuContext, region: Rect) -> usize {
        let (x, y, w, h) = region.to_pixels(self.size);
        if w == 0 || h == 0 {
            return 0;
        }
        let bx0 = x / DEBUG_BLOCK_SIZE;
        let by0 = y / DEBUG_BLOCK_SIZE;
        let bx1 = (x + w - 1) / DEBUG_BLOCK_SIZE;
        let by1 = (y + h - 1) / DEBUG_BLOCK_SIZE;

        gpu.bind_framebuffer(RenderTarget::Screen);
        gpu.set_scissor(Some(region));
        gpu.set_blend(BlendFactors::NORMAL);
        let mut count = 0;
        for by in by0..=by1 {
            for bx in bx0..=bx1 {
                let block = Rect::new(
                    (bx * DEBUG_BLOCK_SIZE) as f32,
                    (by * DEBUG_BLOCK_SIZE) as f32,
                    ((bx + 1) * DEBUG_BLOCK_SIZE) as f32,
                    ((by + 1) * DEBUG_BLOCK_SIZE) as f32,
                );
                gpu.fill_rect(block, DEBUG_TINT, DEBUG_TINT_ALPHA);
                count += 1;
            }
        }
        count
    }
}

/// Grow `rect` outward to whole debug blocks, clamped to the canvas.
fn snap_to_blocks(rect: Rect, size: Size) -> Rect {
    let block = DEBUG_BLOCK_SIZE as f32;
    let snapped = Rect::new(
        (rect.min.x / block).floor() * block,
        (rect.min.y / block).floor() * block,
        (rect.max.x / block).ceil() * block,
        (rect.max.y / block).ceil() * block,
    );
    snapped.intersect(&size.rect())
}
