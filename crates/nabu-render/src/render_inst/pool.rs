use core::cmp::Ordering;

use super::{InstanceFlags, RenderInstance};

/// Growable arena of [`RenderInstance`]s addressed by index.
///
/// Slots `[0, alloc_count)` are in play this frame; everything past that is
/// implicitly free. Instances are constructed when the arena grows and then
/// recycled forever, so a warmed-up pool performs no heap allocation.
///
/// Released slots inside the live prefix go on a free-index stack and are
/// handed out again before the pool grows.
#[derive(Debug, Default)]
pub struct InstancePool {
    slots: Vec<RenderInstance>,
    alloc_count: usize,
    free_indices: Vec<usize>,
}

impl InstancePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-constructs `capacity` instances.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, RenderInstance::new);
        Self {
            slots,
            alloc_count: 0,
            free_indices: Vec::new(),
        }
    }

    /// Returns the index of a slot the caller now owns.
    ///
    /// The slot's contents are whatever its last lifetime left behind; the
    /// caller resets or overwrites them and sets non-empty flags.
    pub fn alloc_index(&mut self) -> usize {
        if let Some(index) = self.free_indices.pop() {
            debug_assert!(self.slots[index].is_free());
            return index;
        }

        let index = self.alloc_count;
        self.alloc_count += 1;

        if self.alloc_count > self.slots.len() {
            self.slots.push(RenderInstance::new());
            if self.slots.len().is_power_of_two() {
                log::debug!("instance pool grew to {} slots", self.slots.len());
            }
        }

        index
    }

    /// Marks the slot free. Nothing moves.
    pub fn release(&mut self, index: usize) {
        debug_assert!(index < self.alloc_count, "release of slot {index} outside live range");
        let inst = &mut self.slots[index];
        debug_assert!(!inst.is_free(), "double release of slot {index}");
        inst.flags = InstanceFlags::empty();
        self.free_indices.push(index);
    }

    /// Frees every live slot. Constructed instances are kept for reuse.
    pub fn reset(&mut self) {
        for inst in &mut self.slots[..self.alloc_count] {
            inst.flags = InstanceFlags::empty();
        }
        self.alloc_count = 0;
        self.free_indices.clear();
    }

    /// Drops every slot. The pool is empty afterwards.
    pub fn destroy(&mut self) {
        self.slots = Vec::new();
        self.free_indices = Vec::new();
        self.alloc_count = 0;
    }

    /// Sorts the live prefix in place.
    ///
    /// Free-index bookkeeping refers to positions, so it is dropped; the pool
    /// must be `reset` before the next allocation.
    pub fn sort_live_by<F>(&mut self, compare: F)
    where
        F: FnMut(&RenderInstance, &RenderInstance) -> Ordering,
    {
        self.slots[..self.alloc_count].sort_unstable_by(compare);
        self.free_indices.clear();
    }

    #[inline]
    pub fn get(&self, index: usize) -> &RenderInstance {
        &self.slots[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut RenderInstance {
        &mut self.slots[index]
    }

    /// Mutable access to two distinct slots.
    pub fn get_pair_mut(&mut self, a: usize, b: usize) -> (&mut RenderInstance, &mut RenderInstance) {
        assert_ne!(a, b, "get_pair_mut needs two distinct slots");
        if a < b {
            let (lo, hi) = self.slots.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Slots `[0, alloc_count)`.
    #[inline]
    pub fn live(&self) -> &[RenderInstance] {
        &self.slots[..self.alloc_count]
    }

    #[inline]
    pub fn live_mut(&mut self) -> &mut [RenderInstance] {
        &mut self.slots[..self.alloc_count]
    }

    #[inline]
    pub fn alloc_count(&self) -> usize {
        self.alloc_count
    }

    /// Released slots inside the live prefix awaiting reuse.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }

    /// Constructed instances.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
