//! Identity map from [`ObjectId`] to the pooled slot holding that object.
//!
//! The registry is the single source of truth for which objects are live:
//! an object is part of the world exactly while its id is registered here.

use std::collections::HashMap;

use crate::object::ObjectId;
use crate::pool::ObjectHandle;
use crate::WorldError;

/// Unique-id to handle map plus the generator for fresh ids.
///
/// The reverse map answers "which id was this slot registered under"
/// without trusting the object's own id field.
#[derive(Debug)]
pub struct IdentityRegistry {
    entries: HashMap<ObjectId, ObjectHandle>,
    by_handle: HashMap<ObjectHandle, ObjectId>,
    next_id: u64,
}

impl IdentityRegistry {
    /// Create an empty registry. The first generated id is `1`.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_handle: HashMap::new(),
            next_id: 1,
        }
    }

    /// Produce an id that is not currently registered.
    ///
    /// Ids are sequential. Values already claimed through an explicit id are
    /// skipped rather than handed out twice.
    pub fn next_id(&mut self) -> ObjectId {
        loop {
            let id = ObjectId::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    /// Register `id` for `handle`.
    ///
    /// # Errors
    ///
    /// [`WorldError::DuplicateIdentity`] if `id` is already registered. The
    /// existing entry is left untouched.
    pub fn register(&mut self, id: ObjectId, handle: ObjectHandle) -> Result<(), WorldError> {
        use std::collections::hash_map::Entry;
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(WorldError::DuplicateIdentity { id }),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                self.by_handle.insert(handle, id);
                Ok(())
            }
        }
    }

    /// Remove `id`, returning the handle it mapped to.
    pub fn unregister(&mut self, id: ObjectId) -> Option<ObjectHandle> {
        let handle = self.entries.remove(&id)?;
        self.by_handle.remove(&handle);
        Some(handle)
    }

    /// Handle registered for `id`.
    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<ObjectHandle> {
        self.entries.get(&id).copied()
    }

    /// Id that `handle` was registered under.
    #[inline]
    pub fn id_of(&self, handle: ObjectHandle) -> Option<ObjectId> {
        self.by_handle.get(&handle).copied()
    }

    /// Whether `id` is registered.
    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered ids, sorted ascending.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
