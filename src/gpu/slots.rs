// ============================================================================
// TEXTURE SLOT MANAGER: N hardware texture units, unbounded logical textures
// ============================================================================
//
// A fixed array of slots, each remembering its occupant and when it was last
// used.  Binding never fails: a full pool evicts its least recently used slot
// (ties → lowest index).  N is the hardware unit count (≤ 32 in practice), so
// every lookup is a plain linear scan.
//
// "Time" is a logical clock advanced on every bind, which keeps eviction
// order deterministic and independent of the wall clock.
// ============================================================================

use super::texture::TextureId;

/// One texture-unit binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Slot {
    pub occupant: Option<TextureId>,
    pub last_used: u64,
}

/// Outcome of a bind request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotBinding {
    pub index: usize,
    /// The unit's contents changed, so the backend must rebind it.
    pub needs_bind: bool,
    /// Texture that lost its unit to make room.
    pub evicted: Option<TextureId>,
}

#[derive(Debug)]
pub struct TextureSlotManager {
    slots: Vec<Slot>,
    clock: u64,
    evictions: u64,
}

impl TextureSlotManager {
    /// A pool of `units` slots (at least one).
    pub fn new(units: usize) -> Self {
        Self {
            slots: vec![Slot::default(); units.max(1)],
            clock: 0,
            evictions: 0,
        }
    }

    /// Give `id` a slot and return its index.
    pub fn ensure_bound(&mut self, id: TextureId) -> usize {
        self.bind(id).index
    }

    /// Like `ensure_bound`, reporting whether the unit must be rebound.
    pub fn bind(&mut self, id: TextureId) -> SlotBinding {
        self.clock += 1;
        self.bind_at(id, self.clock)
    }

    /// Bind with an explicit timestamp. Callers mixing this with `bind` must
    /// keep timestamps increasing.
    pub fn bind_at(&mut self, id: TextureId, now: u64) -> SlotBinding {
        self.clock = self.clock.max(now);

        if let Some(index) = self.slot_of(id) {
            self.slots[index].last_used = now;
            return SlotBinding {
                index,
                needs_bind: false,
                evicted: None,
            };
        }

        if let Some(index) = self.slots.iter().position(|s| s.occupant.is_none()) {
            self.slots[index] = Slot {
                occupant: Some(id),
                last_used: now,
            };
            return SlotBinding {
                index,
                needs_bind: true,
                evicted: None,
            };
        }

        let index = self.least_recently_used();
        let evicted = self.slots[index].occupant.replace(id);
        self.slots[index].last_used = now;
        self.evictions += 1;
        crate::log_debug!(
            "slots: evicted {:?} from unit {} for {:?}",
            evicted,
            index,
            id
        );
        SlotBinding {
            index,
            needs_bind: true,
            evicted,
        }
    }

    /// Free the slot held by `id`, if any (texture destroyed).
    pub fn release(&mut self, id: TextureId) -> Option<usize> {
        let index = self.slot_of(id)?;
        self.slots[index] = Slot::default();
        Some(index)
    }

    pub fn clear(&mut self) {
        self.slots.fill(Slot::default());
    }

    pub fn slot_of(&self, id: TextureId) -> Option<usize> {
        self.slots.iter().position(|s| s.occupant == Some(id))
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total evictions since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    fn least_recently_used(&self) -> usize {
        // min_by_key keeps the first minimum, i.e. the lowest index on ties
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_used)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> TextureId {
        TextureId(n)
    }

    #[test]
    fn fills_empty_slots_in_order() {
        let mut m = TextureSlotManager::new(3);
        assert_eq!(m.ensure_bound(id(10)), 0);
        assert_eq!(m.ensure_bound(id(11)), 1);
        assert_eq!(m.ensure_bound(id(12)), 2);
        assert!(m.slots().iter().all(|s| s.occupant.is_some()));
    }

    #[test]
    fn rebinding_refreshes_without_moving() {
        let mut m = TextureSlotManager::new(2);
        m.ensure_bound(id(1));
        m.ensure_bound(id(2));
        let before: Vec<_> = m.slots().iter().map(|s| s.occupant).collect();
        let b = m.bind(id(1));
        assert_eq!(b.index, 0);
        assert!(!b.needs_bind);
        let after: Vec<_> = m.slots().iter().map(|s| s.occupant).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn full_pool_evicts_least_recently_used() {
        let mut m = TextureSlotManager::new(3);
        m.ensure_bound(id(1));
        m.ensure_bound(id(2));
        m.ensure_bound(id(3));
        m.ensure_bound(id(1)); // slot 1 (id 2) is now oldest
        let b = m.bind(id(4));
        assert_eq!(b.index, 1);
        assert_eq!(b.evicted, Some(id(2)));
        assert!(b.needs_bind);
        assert_eq!(m.slot_of(id(2)), None);
        assert_eq!(m.evictions(), 1);
    }

    #[test]
    fn equal_timestamps_evict_lowest_index() {
        let mut m = TextureSlotManager::new(3);
        m.bind_at(id(1), 5);
        m.bind_at(id(2), 5);
        m.bind_at(id(3), 5);
        assert_eq!(m.bind_at(id(4), 6).index, 0);
        assert_eq!(m.bind_at(id(5), 7).index, 1);
    }

    #[test]
    fn released_slot_is_reused_first() {
        let mut m = TextureSlotManager::new(2);
        m.ensure_bound(id(1));
        m.ensure_bound(id(2));
        assert_eq!(m.release(id(1)), Some(0));
        let b = m.bind(id(3));
        assert_eq!(b.index, 0);
        assert_eq!(b.evicted, None);
    }

    #[test]
    fn zero_units_still_gets_one_slot() {
        let mut m = TextureSlotManager::new(0);
        assert_eq!(m.len(), 1);
        assert_eq!(m.ensure_bound(id(1)), 0);
        assert_eq!(m.ensure_bound(id(2)), 0);
    }
}
