//! Deferred structural mutations.
//!
//! The world never changes its set of live objects while it is iterating
//! over them. Removals, deferred additions, and anything a listener asks for
//! are recorded in [`Commands`] and applied in FIFO order at the next safe
//! point: the end of [`World::tick`](crate::world::World::tick), or an
//! explicit [`World::flush`](crate::world::World::flush).
//!
//! # Example
//!
//! ```
//! use ember_world::prelude::*;
//!
//! let mut world = World::new();
//! let handle = world.add(AddObject::new().deferred()).unwrap();
//!
//! // Registered, but not yet part of any group.
//! assert_eq!(world.size(), 1);
//! assert!(world.objects().is_empty());
//!
//! let report = world.flush().unwrap();
//! assert_eq!(report.applied, 1);
//! assert_eq!(world.objects().len(), 1);
//! assert!(world.get(handle).is_some());
//! ```

use std::collections::VecDeque;
use std::fmt;

use crate::group::GroupKey;
use crate::object::{GameObject, ObjectId};
use crate::pool::ObjectHandle;

/// One-shot callback applied to a new object before anyone else sees it.
pub type Mutator = Box<dyn FnOnce(&mut GameObject)>;

// ---------------------------------------------------------------------------
// AddObject
// ---------------------------------------------------------------------------

/// Parameters for adding an object to the world.
///
/// ```
/// use ember_world::prelude::*;
///
/// let request = AddObject::new()
///     .group("enemies")
///     .mutate(|o| o.set_position(10.0, 20.0))
///     .deferred();
/// assert!(request.is_deferred());
/// ```
#[derive(Default)]
pub struct AddObject {
    pub(crate) group: GroupKey,
    pub(crate) id: Option<ObjectId>,
    pub(crate) mutator: Option<Mutator>,
    pub(crate) deferred: bool,
}

impl AddObject {
    /// Add to the default group, immediately, with no mutator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target group.
    pub fn group(mut self, key: impl Into<GroupKey>) -> Self {
        self.group = key.into();
        self
    }

    /// Register the object under `id` instead of a generated one.
    ///
    /// The id is fixed before the mutator runs and cannot change afterwards.
    pub fn id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    /// Mutator applied before the object becomes visible.
    pub fn mutate(mut self, f: impl FnOnce(&mut GameObject) + 'static) -> Self {
        self.mutator = Some(Box::new(f));
        self
    }

    /// Join the group and notify `on_add` at the next safe point instead of
    /// immediately.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// The target group.
    pub fn group_key(&self) -> &GroupKey {
        &self.group
    }

    /// Whether the request is deferred.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }
}

impl fmt::Debug for AddObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddObject")
            .field("group", &self.group)
            .field("id", &self.id)
            .field("mutator", &self.mutator.is_some())
            .field("deferred", &self.deferred)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// What a removal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Whatever object is registered under this id when the command runs.
    Id(ObjectId),
    /// The object in this pool slot, if the generation still matches.
    Handle(ObjectHandle),
}

impl From<ObjectId> for Target {
    fn from(id: ObjectId) -> Self {
        Target::Id(id)
    }
}

impl From<ObjectHandle> for Target {
    fn from(handle: ObjectHandle) -> Self {
        Target::Handle(handle)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The mutation a [`Command`] performs.
#[derive(Debug)]
pub enum CommandKind {
    /// Put an already registered object into its group and notify `on_add`.
    Attach {
        /// The registered object.
        handle: ObjectHandle,
        /// Group it joins.
        group: GroupKey,
    },
    /// Obtain, mutate, register, attach, and notify a new object.
    Spawn(AddObject),
    /// Remove an object through the standard removal path.
    Remove(Target),
}

/// A queued mutation.
#[derive(Debug)]
pub struct Command {
    /// Sequential submission index within the current batch.
    pub index: u32,
    /// What to do.
    pub kind: CommandKind,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Commands that changed the world.
    pub applied: usize,
    /// Commands that referred to an object no longer present (no-ops).
    pub skipped: usize,
    /// Spawns rejected because their id was already taken.
    pub failed: usize,
}

impl ApplyReport {
    /// Total commands processed.
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// FIFO queue of deferred mutations.
///
/// Commands are applied strictly in submission order. The index counter
/// restarts whenever the queue drains.
#[derive(Debug, Default)]
pub struct Commands {
    queue: VecDeque<Command>,
    next_index: u32,
}

impl Commands {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the addition of a new object. The request is treated as
    /// deferred regardless of its own flag.
    pub fn spawn(&mut self, request: AddObject) {
        self.push(CommandKind::Spawn(request));
    }

    /// Queue the removal of one object.
    pub fn remove(&mut self, target: impl Into<Target>) {
        self.push(CommandKind::Remove(target.into()));
    }

    /// Queue the removal of several objects, in iteration order.
    pub fn remove_all<T: Into<Target>>(&mut self, targets: impl IntoIterator<Item = T>) {
        for target in targets {
            self.remove(target);
        }
    }

    pub(crate) fn attach(&mut self, handle: ObjectHandle, group: GroupKey) {
        self.push(CommandKind::Attach { handle, group });
    }

    pub(crate) fn pop(&mut self) -> Option<Command> {
        let cmd = self.queue.pop_front();
        if self.queue.is_empty() {
            self.next_index = 0;
        }
        cmd
    }

    /// Queued commands in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> + '_ {
        self.queue.iter()
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn push(&mut self, kind: CommandKind) {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        self.queue.push_back(Command { index, kind });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_submission_order() {
        let mut cmds = Commands::new();
        cmds.remove(ObjectId::new(1));
        cmds.spawn(AddObject::new());
        cmds.remove(ObjectHandle::new(0, 0));

        let indices: Vec<u32> = cmds.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(matches!(
            cmds.iter().next().map(|c| &c.kind),
            Some(CommandKind::Remove(Target::Id(_)))
        ));
    }

    #[test]
    fn pop_is_fifo_and_resets_index_when_drained() {
        let mut cmds = Commands::new();
        cmds.remove_all([ObjectId::new(1), ObjectId::new(2)]);
        assert_eq!(cmds.len(), 2);

        let first = cmds.pop().unwrap();
        assert!(matches!(first.kind, CommandKind::Remove(Target::Id(id)) if id == ObjectId::new(1)));
        let second = cmds.pop().unwrap();
        assert!(matches!(second.kind, CommandKind::Remove(Target::Id(id)) if id == ObjectId::new(2)));
        assert!(cmds.pop().is_none());

        cmds.remove(ObjectId::new(3));
        assert_eq!(cmds.iter().next().unwrap().index, 0);
    }

    #[test]
    fn add_object_builder() {
        let request = AddObject::new().group("bullets").mutate(|o| o.kind = 4);
        assert_eq!(request.group_key().as_str(), "bullets");
        assert!(!request.is_deferred());
        let dbg = format!("{request:?}");
        assert!(dbg.contains("mutator: true"));
    }

    #[test]
    fn report_total() {
        let report = ApplyReport {
            applied: 2,
            skipped: 1,
            failed: 1,
        };
        assert_eq!(report.total(), 4);
    }
}
