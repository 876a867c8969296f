//! Pooled object storage with generational handles.
//!
//! An [`ObjectHandle`] packs a slot *index* and a *generation*. The generation
//! of a slot is bumped every time its object is freed, so handles held past a
//! free never alias whatever object later reuses the slot.
//!
//! Slots are never deallocated. Once the pool has grown to the peak live
//! population, [`ObjectPool::obtain`] and [`ObjectPool::free`] allocate
//! nothing.

use std::collections::VecDeque;
use std::fmt;

use crate::object::GameObject;

// ---------------------------------------------------------------------------
// ObjectHandle
// ---------------------------------------------------------------------------

/// A lightweight, copyable reference to a pooled object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    /// Construct a handle from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Counters describing pool churn since creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// `obtain` calls served from the free list.
    pub recycled: usize,
    /// `obtain` calls that had to grow the arena.
    pub allocated: usize,
    /// Successful `free` calls.
    pub freed: usize,
}

// ---------------------------------------------------------------------------
// ObjectPool
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot {
    generation: u32,
    live: bool,
    object: GameObject,
}

/// Arena of reusable [`GameObject`]s.
///
/// Free slots are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot slot.
#[derive(Debug, Default)]
pub struct ObjectPool {
    slots: Vec<Slot>,
    free_slots: VecDeque<u32>,
    live: usize,
    stats: PoolStats,
}

impl ObjectPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with `capacity` pre-built free slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        let mut free_slots = VecDeque::with_capacity(capacity);
        for index in 0..capacity {
            slots.push(Slot {
                generation: 0,
                live: false,
                object: GameObject::new(),
            });
            free_slots.push_back(index as u32);
        }
        Self {
            slots,
            free_slots,
            live: 0,
            stats: PoolStats::default(),
        }
    }

    /// Take a reset object out of the pool.
    ///
    /// Reuses the oldest free slot if there is one; only grows the arena when
    /// every slot is live.
    pub fn obtain(&mut self) -> ObjectHandle {
        self.obtain_mut().0
    }

    /// [`obtain`](Self::obtain), also borrowing the fresh object.
    pub fn obtain_mut(&mut self) -> (ObjectHandle, &mut GameObject) {
        self.live += 1;
        let index = match self.free_slots.pop_front() {
            Some(index) => {
                self.stats.recycled += 1;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    live: false,
                    object: GameObject::new(),
                });
                self.stats.allocated += 1;
                (self.slots.len() - 1) as u32
            }
        };
        // a recycled slot's generation was already bumped on free
        let slot = &mut self.slots[index as usize];
        slot.live = true;
        (ObjectHandle::new(index, slot.generation), &mut slot.object)
    }

    /// Reset the object and return its slot to the free list.
    ///
    /// Returns `false` if the handle is stale or already freed. The caller is
    /// responsible for dropping every registry, group, and spatial reference
    /// to the handle first.
    pub fn free(&mut self, handle: ObjectHandle) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.object.reset();
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push_back(handle.index);
        self.live -= 1;
        self.stats.freed += 1;
        true
    }

    /// Whether `handle` refers to a live object.
    #[inline]
    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Borrow a live object.
    #[inline]
    pub fn get(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.slot(handle).map(|s| &s.object)
    }

    /// Mutably borrow a live object.
    #[inline]
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut GameObject> {
        self.slot_mut(handle).map(|s| &mut s.object)
    }

    /// Mutably borrow two distinct live objects at once.
    ///
    /// Returns `None` if either handle is stale or both refer to the same slot.
    pub fn get_pair_mut(
        &mut self,
        a: ObjectHandle,
        b: ObjectHandle,
    ) -> Option<(&mut GameObject, &mut GameObject)> {
        if a.index == b.index || !self.is_live(a) || !self.is_live(b) {
            return None;
        }
        let (ia, ib) = (a.index as usize, b.index as usize);
        if ia < ib {
            let (head, tail) = self.slots.split_at_mut(ib);
            Some((&mut head[ia].object, &mut tail[0].object))
        } else {
            let (head, tail) = self.slots.split_at_mut(ia);
            Some((&mut tail[0].object, &mut head[ib].object))
        }
    }

    /// Number of live objects.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots waiting on the free list.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Total slots ever built.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Churn counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
