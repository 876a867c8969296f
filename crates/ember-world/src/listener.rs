//! Ordered observers of world lifecycle and update events.
//!
//! Listeners are owned by the [`World`](crate::world::World) that notifies
//! them; there is no process-wide event bus. They are notified in the order
//! they were added, with no deduplication and no priorities.
//!
//! Every callback receives the world's deferred [`Commands`] queue. That is
//! the only way a listener can add or remove objects: the world is busy
//! iterating while callbacks run, so structural changes wait for the next
//! safe point.

use std::fmt;

use crate::command::Commands;
use crate::object::GameObject;
use crate::WorldError;

/// Error type listeners return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a listener callback.
pub type ListenerResult = Result<(), BoxError>;

// ---------------------------------------------------------------------------
// WorldListener
// ---------------------------------------------------------------------------

/// Receives world events. Every method defaults to a no-op.
///
/// An error returned from any callback aborts the operation that triggered
/// it and surfaces as [`WorldError::ListenerFailure`]. Listeners later in
/// the list are not notified of that event.
#[allow(unused_variables)]
pub trait WorldListener {
    /// An object joined its group and became visible.
    fn on_add(&mut self, object: &GameObject, commands: &mut Commands) -> ListenerResult {
        Ok(())
    }

    /// An object is leaving the world. It is still fully populated; it is
    /// reset and returned to the pool right after this notification.
    fn on_remove(&mut self, object: &GameObject, commands: &mut Commands) -> ListenerResult {
        Ok(())
    }

    /// Per-tick update of one candidate.
    fn on_update(
        &mut self,
        object: &mut GameObject,
        delta: f32,
        commands: &mut Commands,
    ) -> ListenerResult {
        Ok(())
    }

    /// Per-tick interaction of two distinct active candidates. Called once
    /// for each ordered pair, so both `(a, b)` and `(b, a)` are seen.
    fn on_pair_update(
        &mut self,
        object: &mut GameObject,
        other: &mut GameObject,
        delta: f32,
        commands: &mut Commands,
    ) -> ListenerResult {
        Ok(())
    }

    /// An object entered (`updatable == true`) or left the candidate set.
    fn on_status_change(
        &mut self,
        object: &GameObject,
        updatable: bool,
        commands: &mut Commands,
    ) -> ListenerResult {
        Ok(())
    }

    /// The world was cleared. Sent once, after every object was removed.
    fn on_clear(&mut self, commands: &mut Commands) -> ListenerResult {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ListenerEvent
// ---------------------------------------------------------------------------

/// Which callback produced a [`WorldError::ListenerFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent {
    Add,
    Remove,
    Update,
    PairUpdate,
    StatusChange,
    Clear,
}

impl fmt::Display for ListenerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerEvent::Add => "on_add",
            ListenerEvent::Remove => "on_remove",
            ListenerEvent::Update => "on_update",
            ListenerEvent::PairUpdate => "on_pair_update",
            ListenerEvent::StatusChange => "on_status_change",
            ListenerEvent::Clear => "on_clear",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ListenerRegistry
// ---------------------------------------------------------------------------

/// Token returned by [`ListenerRegistry::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Insertion-ordered list of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<(ListenerId, Box<dyn WorldListener>)>,
    next_id: u64,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. It is notified after every listener added before it.
    pub fn add(&mut self, listener: Box<dyn WorldListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener, handing it back to the caller.
    pub fn remove(&mut self, id: ListenerId) -> Option<Box<dyn WorldListener>> {
        let pos = self.entries.iter().position(|(lid, _)| *lid == id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call `f` on each listener in order, stopping at the first error.
    pub fn notify<F>(&mut self, event: ListenerEvent, mut f: F) -> Result<(), WorldError>
    where
        F: FnMut(&mut dyn WorldListener) -> ListenerResult,
    {
        for (_, listener) in &mut self.entries {
            f(listener.as_mut()).map_err(|source| WorldError::ListenerFailure { event, source })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
