//! Property tests for world bookkeeping.
//!
//! Random sequences of additions, removals, group clears, flushes, and ticks
//! are applied to a world, and the registry, group index, pool, and
//! candidate set are checked against each other after every step.

use std::collections::HashSet;

use ember_world::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum WorldOp {
    Add { group: u8, x: f32, y: f32, deferred: bool },
    AddWithId(u64),
    Remove(usize),
    RemoveTwice(usize),
    ClearGroup(u8),
    Flush,
    Tick,
}

fn world_op_strategy() -> impl Strategy<Value = WorldOp> {
    prop_oneof![
        4 => (0..3u8, 0.0..200.0f32, 0.0..200.0f32, any::<bool>())
            .prop_map(|(group, x, y, deferred)| WorldOp::Add { group, x, y, deferred }),
        1 => (1..40u64).prop_map(WorldOp::AddWithId),
        2 => (0..64usize).prop_map(WorldOp::Remove),
        1 => (0..64usize).prop_map(WorldOp::RemoveTwice),
        1 => (0..3u8).prop_map(WorldOp::ClearGroup),
        1 => Just(WorldOp::Flush),
        2 => Just(WorldOp::Tick),
    ]
}

fn group_name(g: u8) -> GroupKey {
    GroupKey::from(format!("g{g}"))
}

/// Apply `op`, tracking every handle the world has ever returned.
fn apply(world: &mut World, handles: &mut Vec<ObjectHandle>, op: &WorldOp) {
    match *op {
        WorldOp::Add { group, x, y, deferred } => {
            let mut request = AddObject::new().group(group_name(group)).mutate(move |o| {
                o.set_position(x, y);
                o.set_dimensions(4.0, 4.0);
            });
            if deferred {
                request = request.deferred();
            }
            handles.push(world.add(request).unwrap());
        }
        WorldOp::AddWithId(raw) => {
            let id = ObjectId::new(raw);
            let existed = world.contains(id);
            match world.add(AddObject::new().id(id)) {
                Ok(h) => handles.push(h),
                Err(WorldError::DuplicateIdentity { id: dup }) => {
                    assert!(existed);
                    assert_eq!(dup, id);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        WorldOp::Remove(i) => {
            if !handles.is_empty() {
                world.remove(handles[i % handles.len()]);
            }
        }
        WorldOp::RemoveTwice(i) => {
            if !handles.is_empty() {
                let h = handles[i % handles.len()];
                world.remove(h);
                world.remove(h);
            }
        }
        WorldOp::ClearGroup(g) => {
            world.clear_group(&group_name(g)).unwrap();
        }
        WorldOp::Flush => {
            world.flush().unwrap();
        }
        WorldOp::Tick => {
            world.tick(0.016).unwrap();
        }
    }
}

/// Registry, groups, pool, and candidates agree with each other.
fn check_consistency(world: &World) -> Result<(), TestCaseError> {
    let grouped = world.objects();
    let mut ids = HashSet::new();
    for object in &grouped {
        prop_assert!(ids.insert(object.id()), "object listed twice");
        prop_assert!(world.contains(object.id()));
    }
    prop_assert!(grouped.len() <= world.size());

    let mut group_total = 0;
    for key in world.group_keys() {
        group_total += world.group_handles(key).map_or(0, <[_]>::len);
    }
    prop_assert_eq!(group_total, grouped.len());

    for &h in world.candidates() {
        let object = world.get(h);
        prop_assert!(object.is_some(), "candidate {} is stale", h);
        if let Some(object) = object {
            prop_assert_eq!(world.handle_of(object.id()), Some(h));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Random operation sequences never leave the indexes out of sync.
    #[test]
    fn random_sequences_keep_indexes_consistent(
        ops in prop::collection::vec(world_op_strategy(), 1..80),
    ) {
        let mut world = World::with_config(WorldConfig {
            spatial_threshold: 8,
            ..Default::default()
        })
        .unwrap();
        world.set_bounds(RectBounds::new(150.0, 150.0));
        world.set_camera(std::rc::Rc::new(FixedViewport::new(Rect::new(0.0, 0.0, 60.0, 60.0))));

        let mut handles = Vec::new();
        for op in &ops {
            apply(&mut world, &mut handles, op);
            check_consistency(&world)?;
        }

        world.flush().unwrap();
        check_consistency(&world)?;
        prop_assert_eq!(world.pending_commands().len(), 0);
        // after a full flush every registered object is attached to a group
        prop_assert_eq!(world.objects().len(), world.size());
    }

    /// The same sequence applied to two fresh worlds yields identical state.
    #[test]
    fn world_is_deterministic(ops in prop::collection::vec(world_op_strategy(), 1..60)) {
        fn run_once(ops: &[WorldOp]) -> Vec<(ObjectId, u32, u32)> {
            let mut world = World::new();
            world.set_bounds(RectBounds::new(150.0, 150.0));
            let mut handles = Vec::new();
            for op in ops {
                apply(&mut world, &mut handles, op);
            }
            world
                .objects()
                .iter()
                .map(|o| (o.id(), o.left().to_bits(), o.top().to_bits()))
                .collect()
        }

        prop_assert_eq!(run_once(&ops), run_once(&ops));
    }

    /// Removing an object any number of times notifies `on_remove` once.
    #[test]
    fn removal_is_idempotent(repeats in 1..6usize, by_id in any::<bool>()) {
        use std::cell::Cell;
        use std::rc::Rc;

        struct CountRemovals(Rc<Cell<usize>>);
        impl WorldListener for CountRemovals {
            fn on_remove(&mut self, _: &GameObject, _: &mut Commands) -> ListenerResult {
                self.0.set(self.0.get() + 1);
                Ok(())
            }
        }

        let removed = Rc::new(Cell::new(0));
        let mut world = World::new();
        world.add_listener(CountRemovals(Rc::clone(&removed)));
        let h = world.add_object().unwrap();
        let id = world.get(h).unwrap().id();

        for _ in 0..repeats {
            if by_id {
                world.remove(id);
            } else {
                world.remove(h);
            }
        }
        let report = world.flush().unwrap();
        prop_assert_eq!(report.applied, 1);
        prop_assert_eq!(report.skipped, repeats - 1);
        prop_assert_eq!(removed.get(), 1);
        prop_assert!(world.get_object_by_id(id).is_none());
    }

    /// Generated ids never collide with explicitly chosen ones.
    #[test]
    fn generated_ids_skip_taken_ones(taken in prop::collection::hash_set(1..50u64, 0..20)) {
        let mut world = World::new();
        for &raw in &taken {
            world
                .add(AddObject::new().id(ObjectId::new(raw)))
                .unwrap();
        }
        for _ in 0..30 {
            world.add_object().unwrap();
        }
        prop_assert_eq!(world.size(), taken.len() + 30);
    }
}

// -- pool recycling and command ordering ------------------------------------

#[derive(Debug, Clone)]
struct Dirt {
    x: f32,
    y: f32,
    kind: u32,
    persistent: bool,
    active: bool,
    tint: f32,
    status: i64,
}

fn dirt_strategy() -> impl Strategy<Value = Dirt> {
    (
        -500.0..500.0f32,
        -500.0..500.0f32,
        any::<u32>(),
        any::<bool>(),
        any::<bool>(),
        0.0..1.0f32,
        any::<i64>(),
    )
        .prop_map(|(x, y, kind, persistent, active, tint, status)| Dirt {
            x,
            y,
            kind,
            persistent,
            active,
            tint,
            status,
        })
}

fn soil(object: &mut GameObject, dirt: &Dirt) {
    object.set_position(dirt.x, dirt.y);
    object.set_position(dirt.y, dirt.x);
    object.set_dimensions(dirt.tint * 10.0, 3.0);
    object.scale = Vec2::new(dirt.tint, 2.0);
    object.color = Color::rgba(dirt.tint, 0.0, 1.0, 0.5);
    object.kind = dirt.kind;
    object.persistent = dirt.persistent;
    object.active = dirt.active;
    object.status.set(StatusKey(3), StatusValue::Int(dirt.status));
}

#[derive(Debug, Clone)]
enum Deferred {
    Attach,
    Remove(usize),
}

fn deferred_strategy() -> impl Strategy<Value = Deferred> {
    prop_oneof![
        1 => Just(Deferred::Attach),
        2 => (0..64usize).prop_map(Deferred::Remove),
    ]
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Add(ObjectId),
    Remove(ObjectId),
}

#[derive(Clone, Default)]
struct Journal(std::rc::Rc<std::cell::RefCell<Vec<Seen>>>);

impl WorldListener for Journal {
    fn on_add(&mut self, o: &GameObject, _: &mut Commands) -> ListenerResult {
        self.0.borrow_mut().push(Seen::Add(o.id()));
        Ok(())
    }

    fn on_remove(&mut self, o: &GameObject, _: &mut Commands) -> ListenerResult {
        self.0.borrow_mut().push(Seen::Remove(o.id()));
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A recycled slot hands out an object indistinguishable from a new one,
    /// and free slots are reused oldest first.
    #[test]
    fn recycled_objects_are_reset(
        dirt in prop::collection::vec(dirt_strategy(), 1..24),
        order in prop::collection::vec(any::<prop::sample::Index>(), 1..24),
    ) {
        let mut pool = ObjectPool::new();
        let mut handles = Vec::new();
        for d in &dirt {
            let (h, object) = pool.obtain_mut();
            soil(object, d);
            handles.push(h);
        }

        let mut freed = Vec::new();
        for idx in &order {
            let h = handles[idx.index(handles.len())];
            if pool.free(h) {
                freed.push(h);
            } else {
                prop_assert!(freed.contains(&h));
            }
        }
        prop_assert_eq!(pool.live_count(), handles.len() - freed.len());
        prop_assert_eq!(pool.free_count(), freed.len());

        for old in &freed {
            let (h, object) = pool.obtain_mut();
            prop_assert_eq!(h.index(), old.index());
            prop_assert_ne!(h.generation(), old.generation());
            prop_assert_eq!(&*object, &GameObject::new());
            prop_assert!(!pool.is_live(*old));
        }
        prop_assert_eq!(pool.live_count(), handles.len());
        prop_assert_eq!(pool.capacity(), handles.len());
    }

    /// Deferred attaches and removals reach listeners in submission order.
    #[test]
    fn random_deferred_commands_keep_submission_order(
        initial in 0..16usize,
        ops in prop::collection::vec(deferred_strategy(), 1..48),
    ) {
        let journal = Journal::default();
        let mut world = World::new();
        world.add_listener(journal.clone());
        let mut handles = Vec::new();
        for _ in 0..initial {
            handles.push(world.add_object().unwrap());
        }
        journal.0.borrow_mut().clear();

        let mut expected = Vec::new();
        let mut removed = HashSet::new();
        let mut ids = std::collections::HashMap::new();
        for &h in &handles {
            ids.insert(h, world.get(h).unwrap().id());
        }
        for op in &ops {
            match *op {
                Deferred::Attach => {
                    let h = world.add(AddObject::new().deferred()).unwrap();
                    let id = world.get(h).unwrap().id();
                    ids.insert(h, id);
                    handles.push(h);
                    expected.push(Seen::Add(id));
                }
                Deferred::Remove(i) => {
                    if handles.is_empty() {
                        continue;
                    }
                    let h = handles[i % handles.len()];
                    world.remove(h);
                    if removed.insert(h) {
                        expected.push(Seen::Remove(ids[&h]));
                    }
                }
            }
        }
        prop_assert!(journal.0.borrow().is_empty());

        world.flush().unwrap();
        prop_assert_eq!(&*journal.0.borrow(), &expected);
        prop_assert_eq!(world.size(), handles.len() - removed.len());
    }
}
