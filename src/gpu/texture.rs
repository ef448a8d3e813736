// ============================================================================
// TEXTURE CACHE: logical textures, their framebuffers and unit bindings
// ============================================================================

use std::collections::HashMap;

use super::slots::TextureSlotManager;
use super::{FramebufferHandle, GpuContext, ImageHandle, RenderTarget};
use crate::geometry::Size;

/// Cache-local texture identity. Never reused within one cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// A backend image plus the framebuffer that renders into it.
///
/// Fields are fixed at creation; only the pixel contents ever change.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    image: ImageHandle,
    framebuffer: FramebufferHandle,
    size: Size,
}

impl Texture {
    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    pub fn size(&self) -> Size {
        self.size
    }
}

/// Owns every texture it creates and the slot pool they share.
#[derive(Debug)]
pub struct TextureCache {
    textures: HashMap<TextureId, Texture>,
    slots: TextureSlotManager,
    next_id: u32,
}

impl TextureCache {
    pub fn new(units: usize) -> Self {
        Self {
            textures: HashMap::new(),
            slots: TextureSlotManager::new(units),
            next_id: 1,
        }
    }

    /// Allocate a texture + framebuffer pair and give it a unit right away.
    pub fn create_texture_with_framebuffer(&mut self, gpu: &mut dyn GpuContext, size: Size) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;

        let image = gpu.create_texture(size);
        let framebuffer = gpu.create_framebuffer(image);
        self.textures.insert(
            id,
            Texture {
                id,
                image,
                framebuffer,
                size,
            },
        );
        crate::log_debug!("textures: created {:?} ({}x{})", id, size.width, size.height);

        self.bind(gpu, id);
        id
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    /// Framebuffer of a texture this cache created.
    ///
    /// # Panics
    /// If `id` is unknown: rendering into a texture that was never created
    /// is a logic error.
    pub fn framebuffer(&self, id: TextureId) -> FramebufferHandle {
        match self.textures.get(&id) {
            Some(texture) => texture.framebuffer,
            None => panic!("texture {:?} has no framebuffer", id),
        }
    }

    /// Make `id` the render target.
    pub fn render_to(&self, gpu: &mut dyn GpuContext, id: TextureId) {
        gpu.bind_framebuffer(RenderTarget::Framebuffer(self.framebuffer(id)));
    }

    /// Ensure `id` sits on a texture unit and return the unit.
    ///
    /// # Panics
    /// If `id` is unknown.
    pub fn bind(&mut self, gpu: &mut dyn GpuContext, id: TextureId) -> usize {
        let image = match self.textures.get(&id) {
            Some(texture) => texture.image,
            None => panic!("texture {:?} is not in the cache", id),
        };
        let binding = self.slots.bind(id);
        if binding.needs_bind {
            gpu.bind_texture(binding.index, image);
        }
        binding.index
    }

    pub fn slots(&self) -> &TextureSlotManager {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Tear down every texture. The cache is empty afterwards.
    pub fn destroy_all(&mut self, gpu: &mut dyn GpuContext) {
        for (_, texture) in self.textures.drain() {
            gpu.delete_framebuffer(texture.framebuffer);
            gpu.delete_texture(texture.image);
        }
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareGpu;

    #[test]
    fn new_texture_is_bound_immediately() {
        let mut gpu = SoftwareGpu::new(Size::new(8, 8), 2);
        let mut cache = TextureCache::new(2);
        let a = cache.create_texture_with_framebuffer(&mut gpu, Size::new(8, 8));
        assert_eq!(cache.slots().slot_of(a), Some(0));
        assert_eq!(cache.get(a).map(|t| t.size()), Some(Size::new(8, 8)));
    }

    #[test]
    fn more_textures_than_units_share_the_pool() {
        let mut gpu = SoftwareGpu::new(Size::new(4, 4), 2);
        let mut cache = TextureCache::new(2);
        let ids: Vec<_> = (0..5)
            .map(|_| cache.create_texture_with_framebuffer(&mut gpu, Size::new(4, 4)))
            .collect();
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.slots().evictions(), 3);
        // the first texture can always get a unit back
        let unit = cache.bind(&mut gpu, ids[0]);
        assert!(unit < 2);
        assert_eq!(cache.slots().slot_of(ids[0]), Some(unit));
    }

    #[test]
    #[should_panic]
    fn unknown_framebuffer_fails_fast() {
        let cache = TextureCache::new(1);
        cache.framebuffer(TextureId(99));
    }

    #[test]
    fn destroy_all_empties_cache() {
        let mut gpu = SoftwareGpu::new(Size::new(4, 4), 4);
        let mut cache = TextureCache::new(4);
        cache.create_texture_with_framebuffer(&mut gpu, Size::new(4, 4));
        cache.create_texture_with_framebuffer(&mut gpu, Size::new(4, 4));
        cache.destroy_all(&mut gpu);
        assert!(cache.is_empty());
        assert_eq!(gpu.image_count(), 0);
    }
}
