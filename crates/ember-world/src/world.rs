//! The [`World`] owns every live object and drives the per-tick pipeline.
//!
//! Each call to [`World::tick`] runs four strictly ordered phases:
//!
//! 1. **Rebuild candidates.** Below the spatial threshold every live object
//!    is a candidate. At or above it, the quad tree is rebuilt from scratch
//!    and queried with the camera viewport, padded on every side and clamped
//!    to the world bounds. Objects whose candidate status flipped get one
//!    `on_status_change` each.
//! 2. **Evict.** Candidates outside the world bounds that are not persistent
//!    are queued for removal and dropped from the candidate set.
//! 3. **Per-object update.** Each candidate, in candidate order, is handed to
//!    every listener's `on_update`.
//! 4. **Pairwise update.** Every ordered pair of distinct active candidates
//!    is handed to every listener's `on_pair_update`.
//!
//! The deferred command queue is then flushed. An error from any listener
//! aborts the tick at that point; queued commands stay queued until the next
//! safe point.

use std::cmp::Ordering;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::bounds::{Camera, Unbounded, WorldBounds};
use crate::command::{AddObject, ApplyReport, CommandKind, Commands, Target};
use crate::config::WorldConfig;
use crate::group::{GroupIndex, GroupKey};
use crate::identity::IdentityRegistry;
use crate::listener::{ListenerEvent, ListenerId, ListenerRegistry, WorldListener};
use crate::math::Rect;
use crate::object::{GameObject, ObjectId};
use crate::pool::{ObjectHandle, ObjectPool, PoolStats};
use crate::spatial::QuadTree;
use crate::WorldError;

/// Comparator accepted by [`World::get_objects`].
pub type ObjectComparator<'a> = &'a dyn Fn(&GameObject, &GameObject) -> Ordering;

/// Region that candidates are selected from when culling.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CullRegion {
    /// No usable region; every live object is a candidate.
    Everything,
    Within(Rect),
    /// The viewport misses the world entirely.
    Empty,
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// What one [`World::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Candidates left after eviction.
    pub candidates: usize,
    /// Out-of-bounds candidates queued for removal.
    pub evicted: usize,
    /// Objects dispatched to `on_update`.
    pub single_updates: usize,
    /// Ordered pairs dispatched to `on_pair_update`.
    pub pair_updates: usize,
    /// Whether the spatial index was used to select candidates.
    pub culled: bool,
    /// Result of the end-of-tick flush.
    pub applied: ApplyReport,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Container and scheduler for game objects.
pub struct World {
    config: WorldConfig,
    pool: ObjectPool,
    identities: IdentityRegistry,
    groups: GroupIndex,
    listeners: ListenerRegistry,
    commands: Commands,
    spatial: QuadTree,
    /// Candidate set of the current (or last) tick.
    candidates: Vec<ObjectHandle>,
    /// Set when a removal may have left a stale handle in `candidates`.
    candidates_dirty: bool,
    /// Reusable buffer for teardown loops.
    scratch: Vec<ObjectHandle>,
    /// Per-slot stamp marking membership in the candidate set of tick `stamp`.
    marks: Vec<u64>,
    stamp: u64,
    bounds: Box<dyn WorldBounds>,
    camera: Option<Rc<dyn Camera>>,
    last_apply_report: ApplyReport,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("size", &self.identities.len())
            .field("candidates", &self.candidates.len())
            .field("pending_commands", &self.commands.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty, unbounded world with the default configuration.
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create an empty, unbounded world.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidConfig`] if `config` fails validation.
    pub fn with_config(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            pool: ObjectPool::with_capacity(config.pool_capacity),
            identities: IdentityRegistry::new(),
            groups: GroupIndex::new(),
            listeners: ListenerRegistry::new(),
            commands: Commands::new(),
            spatial: QuadTree::new(config.spatial.clone(), Rect::default()),
            candidates: Vec::new(),
            candidates_dirty: false,
            scratch: Vec::new(),
            marks: Vec::new(),
            stamp: 0,
            bounds: Box::new(Unbounded),
            camera: None,
            last_apply_report: ApplyReport::default(),
            config,
        }
    }

    // -- collaborators ------------------------------------------------------

    /// Active configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replace the world-bounds policy. By default everything is in bounds.
    pub fn set_bounds(&mut self, bounds: impl WorldBounds + 'static) {
        self.bounds = Box::new(bounds);
    }

    /// The world-bounds policy.
    pub fn bounds(&self) -> &dyn WorldBounds {
        self.bounds.as_ref()
    }

    /// Set the camera whose viewport drives spatial culling.
    pub fn set_camera(&mut self, camera: Rc<dyn Camera>) {
        self.camera = Some(camera);
    }

    /// Forget the camera.
    pub fn clear_camera(&mut self) {
        self.camera = None;
    }

    /// Append a listener.
    pub fn add_listener(&mut self, listener: impl WorldListener + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    /// Remove a listener, handing it back.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn WorldListener>> {
        self.listeners.remove(id)
    }

    // -- adding -------------------------------------------------------------

    /// Add an object to the default group, immediately.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_object(&mut self) -> Result<ObjectHandle, WorldError> {
        self.add(AddObject::new())
    }

    /// Add an object.
    ///
    /// The object is obtained from the pool, given the requested id (or a
    /// fresh one), passed through the request's mutator, and registered.
    /// An immediate request then joins its group and notifies `on_add` before
    /// returning; a deferred one does both at the next safe point.
    ///
    /// # Errors
    ///
    /// - [`WorldError::DuplicateIdentity`] if the requested id is already
    ///   registered. The new object goes straight back to the pool and no
    ///   listener is notified.
    /// - [`WorldError::ListenerFailure`] if an `on_add` listener failed. The
    ///   object stays in the world.
    pub fn add(&mut self, request: AddObject) -> Result<ObjectHandle, WorldError> {
        let AddObject {
            group,
            id,
            mutator,
            deferred,
        } = request;

        let id = id.unwrap_or_else(|| self.identities.next_id());
        let (handle, object) = self.pool.obtain_mut();
        object.set_id(id);
        if let Some(mutate) = mutator {
            mutate(object);
        }
        debug!(%id, handle = ?handle, "obtained new object");

        if let Err(err) = self.identities.register(id, handle) {
            warn!(%id, "object already exists; returning the new instance to the pool");
            self.pool.free(handle);
            return Err(err);
        }

        if deferred {
            debug!(%id, %group, "requested deferred addition");
            self.commands.attach(handle, group);
        } else {
            self.attach(handle, group)?;
        }
        Ok(handle)
    }

    /// Put a registered object into `group` and notify `on_add`.
    ///
    /// Returns `false` if the object was removed in the meantime.
    fn attach(&mut self, handle: ObjectHandle, group: GroupKey) -> Result<bool, WorldError> {
        let Some(object) = self.pool.get(handle) else {
            debug!(handle = ?handle, "deferred object no longer exists");
            return Ok(false);
        };
        debug!(id = %object.id(), %group, "added object");
        self.groups.add_to_group(group, handle);
        let commands = &mut self.commands;
        self.listeners
            .notify(ListenerEvent::Add, |l| l.on_add(object, commands))?;
        Ok(true)
    }

    // -- removing -----------------------------------------------------------

    /// Queue the removal of an object, by id or handle.
    ///
    /// Removal happens at the next safe point. Removing an object that is
    /// already gone, or removing the same object twice, is a no-op.
    pub fn remove(&mut self, target: impl Into<Target>) {
        let target = target.into();
        debug!(?target, "requested removal");
        self.commands.remove(target);
    }

    /// Queue the removal of several objects, in order.
    pub fn remove_all<T: Into<Target>>(&mut self, targets: impl IntoIterator<Item = T>) {
        for target in targets {
            self.remove(target);
        }
    }

    fn remove_by_id(&mut self, id: ObjectId) -> Result<bool, WorldError> {
        match self.identities.get(id) {
            Some(handle) => self.remove_internal(id, handle),
            None => {
                debug!(%id, "object does not exist any longer");
                Ok(false)
            }
        }
    }

    fn remove_by_handle(&mut self, handle: ObjectHandle) -> Result<bool, WorldError> {
        if !self.pool.is_live(handle) {
            debug!(handle = ?handle, "object does not exist any longer");
            return Ok(false);
        }
        match self.identities.id_of(handle) {
            Some(id) => self.remove_internal(id, handle),
            None => Ok(false),
        }
    }

    /// The standard removal path: unregister, leave the group and candidate
    /// set, notify `on_remove`, free.
    ///
    /// The object is freed even when a listener fails.
    fn remove_internal(&mut self, id: ObjectId, handle: ObjectHandle) -> Result<bool, WorldError> {
        debug!(%id, "removing object");
        self.identities.unregister(id);
        self.groups.remove(handle);
        self.candidates_dirty = true;

        let notified = match self.pool.get(handle) {
            Some(object) => {
                let commands = &mut self.commands;
                self.listeners
                    .notify(ListenerEvent::Remove, |l| l.on_remove(object, commands))
            }
            None => Ok(()),
        };
        self.pool.free(handle);
        notified.map(|()| true)
    }

    /// Remove every member of `key` through the standard removal path, then
    /// delete the group. Returns how many objects were removed.
    ///
    /// # Errors
    ///
    /// [`WorldError::ListenerFailure`] from an `on_remove` listener. Members
    /// not yet reached stay in the group.
    pub fn clear_group(&mut self, key: &GroupKey) -> Result<usize, WorldError> {
        let Some(members) = self.groups.get(key) else {
            return Ok(0);
        };
        let mut handles = std::mem::take(&mut self.scratch);
        handles.clear();
        handles.extend_from_slice(members);

        let mut removed = 0;
        let mut outcome = Ok(());
        for &handle in &handles {
            match self.remove_by_handle(handle) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.scratch = handles;
        self.prune_candidates();
        outcome?;

        self.groups.remove_group(key);
        debug!(group = %key, removed, "cleared group");
        Ok(removed)
    }

    /// Remove every object through the standard removal path, then notify
    /// `on_clear` once.
    ///
    /// Objects still waiting on a deferred addition are removed too. Queued
    /// commands are kept.
    ///
    /// # Errors
    ///
    /// [`WorldError::ListenerFailure`] from `on_remove` or `on_clear`.
    pub fn clear(&mut self) -> Result<(), WorldError> {
        let mut handles = std::mem::take(&mut self.scratch);
        handles.clear();
        handles.extend(self.groups.all());
        for id in self.identities.ids() {
            if let Some(handle) = self.identities.get(id) {
                if self.groups.group_of(handle).is_none() {
                    handles.push(handle);
                }
            }
        }

        let outcome = handles
            .iter()
            .try_for_each(|&handle| self.remove_by_handle(handle).map(drop));
        self.scratch = handles;
        self.prune_candidates();
        outcome?;
        self.groups.clear();

        let commands = &mut self.commands;
        self.listeners
            .notify(ListenerEvent::Clear, |l| l.on_clear(commands))?;
        debug!("cleared all game objects");
        Ok(())
    }

    // -- safe point ---------------------------------------------------------

    /// Apply every queued command in submission order.
    ///
    /// Commands queued by listeners while the flush runs are applied in the
    /// same flush, after everything queued before them.
    ///
    /// # Errors
    ///
    /// [`WorldError::ListenerFailure`] from a listener notified while
    /// applying. Commands after the failing one stay queued.
    pub fn flush(&mut self) -> Result<ApplyReport, WorldError> {
        let outcome = self.apply_commands();
        self.prune_candidates();
        let report = outcome?;
        if report.total() > 0 {
            debug!(
                applied = report.applied,
                skipped = report.skipped,
                failed = report.failed,
                "flushed deferred commands"
            );
        }
        self.last_apply_report = report.clone();
        Ok(report)
    }

    fn apply_commands(&mut self) -> Result<ApplyReport, WorldError> {
        let mut report = ApplyReport::default();
        while let Some(cmd) = self.commands.pop() {
            let applied = match cmd.kind {
                CommandKind::Attach { handle, group } => self.attach(handle, group)?,
                CommandKind::Remove(Target::Id(id)) => self.remove_by_id(id)?,
                CommandKind::Remove(Target::Handle(handle)) => self.remove_by_handle(handle)?,
                CommandKind::Spawn(request) => {
                    let request = AddObject {
                        deferred: false,
                        ..request
                    };
                    match self.add(request) {
                        Ok(_) => true,
                        Err(WorldError::DuplicateIdentity { id }) => {
                            warn!(%id, command_index = cmd.index, "deferred spawn rejected");
                            report.failed += 1;
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
            };
            if applied {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
        Ok(report)
    }

    /// Drop handles freed since the candidate set was built.
    fn prune_candidates(&mut self) {
        if !self.candidates_dirty {
            return;
        }
        let pool = &self.pool;
        self.candidates.retain(|&h| pool.is_live(h));
        self.candidates_dirty = false;
    }

    /// Commands waiting for the next safe point.
    pub fn pending_commands(&self) -> &Commands {
        &self.commands
    }

    /// Report of the most recent flush.
    pub fn last_apply_report(&self) -> &ApplyReport {
        &self.last_apply_report
    }

    // -- tick ---------------------------------------------------------------

    /// Advance the world by `delta` seconds.
    ///
    /// # Errors
    ///
    /// [`WorldError::ListenerFailure`] from any listener. The rest of the
    /// tick is skipped.
    pub fn tick(&mut self, delta: f32) -> Result<TickReport, WorldError> {
        self.stamp += 1;
        let culled = self.rebuild_candidates();
        self.reconcile_status()?;
        let evicted = self.evict_out_of_bounds();
        let single_updates = self.dispatch_updates(delta)?;
        let pair_updates = self.dispatch_pairs(delta)?;
        let candidates = self.candidates.len();
        let applied = self.flush()?;

        trace!(
            candidates,
            evicted,
            single_updates,
            pair_updates,
            culled,
            "tick complete"
        );
        Ok(TickReport {
            candidates,
            evicted,
            single_updates,
            pair_updates,
            culled,
            applied,
        })
    }

    /// Fill the candidate buffer. Returns whether the spatial index was used.
    fn rebuild_candidates(&mut self) -> bool {
        self.candidates.clear();
        if self.groups.len() < self.config.spatial_threshold {
            self.candidates.extend(self.groups.all());
            return false;
        }

        let world_rect = self.bounds.rect();
        self.spatial.clear(world_rect);
        for handle in self.groups.all() {
            if let Some(object) = self.pool.get(handle) {
                self.spatial.insert(handle, object.bounds());
            }
        }

        match self.cull_region(world_rect) {
            CullRegion::Within(region) => {
                self.spatial
                    .retrieve_overlapping(&mut self.candidates, &region);
            }
            CullRegion::Everything => self.candidates.extend(self.groups.all()),
            CullRegion::Empty => {
                trace!("viewport lies outside the world; no candidates");
            }
        }
        true
    }

    fn cull_region(&self, world_rect: Rect) -> CullRegion {
        let Some(camera) = &self.camera else {
            warn!("spatial culling without a camera; using the world bounds");
            return if world_rect.has_area() {
                CullRegion::Within(world_rect)
            } else {
                CullRegion::Everything
            };
        };
        let padded = camera.viewport().padded(self.config.viewport_padding);
        if !world_rect.has_area() {
            return CullRegion::Within(padded);
        }
        match padded.clamped_to(&world_rect) {
            Some(region) => CullRegion::Within(region),
            None => CullRegion::Empty,
        }
    }

    /// Sync each object's cached candidate status with this tick's candidate
    /// set, notifying every transition.
    fn reconcile_status(&mut self) -> Result<(), WorldError> {
        let stamp = self.stamp;
        if self.marks.len() < self.pool.capacity() {
            self.marks.resize(self.pool.capacity(), 0);
        }
        for handle in &self.candidates {
            self.marks[handle.index() as usize] = stamp;
        }

        for handle in self.groups.all() {
            let selected = self.marks[handle.index() as usize] == stamp;
            let Some(object) = self.pool.get_mut(handle) else {
                continue;
            };
            if object.updatable == selected {
                continue;
            }
            object.updatable = selected;
            let object = &*object;
            let commands = &mut self.commands;
            self.listeners.notify(ListenerEvent::StatusChange, |l| {
                l.on_status_change(object, selected, commands)
            })?;
        }
        Ok(())
    }

    /// Drop out-of-bounds, non-persistent candidates and queue their removal.
    fn evict_out_of_bounds(&mut self) -> usize {
        let bounds = self.bounds.as_ref();
        let pool = &self.pool;
        let commands = &mut self.commands;
        let mut evicted = 0;
        self.candidates.retain(|&handle| {
            let Some(object) = pool.get(handle) else {
                return false;
            };
            if object.persistent || bounds.is_in_bounds(object) {
                return true;
            }
            debug!(id = %object.id(), "object is out of bounds; removing");
            commands.remove(handle);
            evicted += 1;
            false
        });
        evicted
    }

    fn dispatch_updates(&mut self, delta: f32) -> Result<usize, WorldError> {
        let mut dispatched = 0;
        for &handle in &self.candidates {
            let Some(object) = self.pool.get_mut(handle) else {
                continue;
            };
            let commands = &mut self.commands;
            self.listeners.notify(ListenerEvent::Update, |l| {
                l.on_update(&mut *object, delta, &mut *commands)
            })?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn dispatch_pairs(&mut self, delta: f32) -> Result<usize, WorldError> {
        let mut dispatched = 0;
        for &a in &self.candidates {
            if !self.pool.get(a).is_some_and(|o| o.active) {
                continue;
            }
            for &b in &self.candidates {
                let Some((object, other)) = self.pool.get_pair_mut(a, b) else {
                    continue;
                };
                if !object.active || !other.active || object.id() == other.id() {
                    continue;
                }
                let commands = &mut self.commands;
                self.listeners.notify(ListenerEvent::PairUpdate, |l| {
                    l.on_pair_update(&mut *object, &mut *other, delta, &mut *commands)
                })?;
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    // -- queries ------------------------------------------------------------

    /// Number of registered objects, including deferred additions not yet
    /// attached to their group.
    pub fn size(&self) -> usize {
        self.identities.len()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.identities.contains(id)
    }

    /// Handle of the object registered as `id`.
    pub fn handle_of(&self, id: ObjectId) -> Option<ObjectHandle> {
        self.identities.get(id)
    }

    /// Look up an object by id.
    pub fn get_object_by_id(&self, id: ObjectId) -> Option<&GameObject> {
        self.identities.get(id).and_then(|h| self.pool.get(h))
    }

    /// Mutable lookup by id.
    pub fn get_object_by_id_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        let handle = self.identities.get(id)?;
        self.pool.get_mut(handle)
    }

    /// Borrow an object through its handle. `None` once it was removed.
    pub fn get(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.pool.get(handle)
    }

    /// Mutably borrow an object through its handle.
    ///
    /// Changing the id here is not checked for uniqueness; set ids in the
    /// creation mutator instead.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut GameObject> {
        self.pool.get_mut(handle)
    }

    /// Objects in group order (groups by key, members by insertion), or the
    /// candidates of the last tick when `updatable_only`, optionally sorted.
    pub fn get_objects(
        &self,
        comparator: Option<ObjectComparator<'_>>,
        updatable_only: bool,
    ) -> Vec<&GameObject> {
        let mut result: Vec<&GameObject> = if updatable_only {
            self.candidates
                .iter()
                .filter_map(|&h| self.pool.get(h))
                .collect()
        } else {
            self.groups
                .all()
                .filter_map(|h| self.pool.get(h))
                .collect()
        };
        if let Some(compare) = comparator {
            result.sort_by(|a, b| compare(a, b));
        }
        result
    }

    /// All attached objects in group order.
    pub fn objects(&self) -> Vec<&GameObject> {
        self.get_objects(None, false)
    }

    /// Candidate handles of the current (or last) tick.
    pub fn candidates(&self) -> &[ObjectHandle] {
        &self.candidates
    }

    /// Members of a group, in insertion order.
    pub fn get_group(&self, key: &GroupKey) -> Option<impl Iterator<Item = &GameObject> + '_> {
        let members = self.groups.get(key)?;
        Some(members.iter().filter_map(|&h| self.pool.get(h)))
    }

    /// Member handles of a group, in insertion order.
    pub fn group_handles(&self, key: &GroupKey) -> Option<&[ObjectHandle]> {
        self.groups.get(key)
    }

    /// Group keys in iteration order.
    pub fn group_keys(&self) -> impl Iterator<Item = &GroupKey> + '_ {
        self.groups.keys()
    }

    /// Object pool churn counters.
    pub fn pool_stats(&self) -> &PoolStats {
        self.pool.stats()
    }

    /// The spatial index as left by the last culled tick.
    pub fn spatial_index(&self) -> &QuadTree {
        &self.spatial
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
