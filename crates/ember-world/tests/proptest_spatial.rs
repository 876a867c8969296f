//! Property tests for the quad tree and camera culling.
//!
//! The tree's coarse query must never miss an overlapping entry, its exact
//! query must match a brute-force scan, and a culled tick must select
//! exactly the objects touching the padded viewport clamped to the world.

use std::rc::Rc;

use ember_world::prelude::*;
use proptest::prelude::*;

const WORLD: f32 = 400.0;

fn rect_strategy(lo: f32, hi: f32) -> impl Strategy<Value = Rect> {
    (lo..hi, lo..hi, 0.0..40.0f32, 0.0..40.0f32).prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

fn sorted(mut handles: Vec<ObjectHandle>) -> Vec<ObjectHandle> {
    handles.sort();
    handles
}

/// Brute-force overlap scan.
fn exact(entries: &[(ObjectHandle, Rect)], query: &Rect) -> Vec<ObjectHandle> {
    sorted(
        entries
            .iter()
            .filter(|(_, bounds)| bounds.overlaps(query))
            .map(|&(h, _)| h)
            .collect(),
    )
}

/// Padded viewport clipped to the world, or `None` when they miss.
fn expected_region(viewport: Rect, padding: f32, world: Rect) -> Option<Rect> {
    let padded = viewport.padded(padding);
    let x = padded.x.max(world.x);
    let y = padded.y.max(world.y);
    let right = padded.right().min(world.right());
    let bottom = padded.bottom().min(world.bottom());
    (x <= right && y <= bottom).then(|| Rect::new(x, y, right - x, bottom - y))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// `retrieve` returns a superset of the exact overlap set and
    /// `retrieve_overlapping` returns exactly that set, each handle once.
    #[test]
    fn quad_tree_queries_cover_every_overlap(
        bounds in prop::collection::vec(rect_strategy(-50.0, WORLD + 50.0), 0..300),
        query in rect_strategy(-100.0, WORLD + 100.0),
        max_objects in 1..16usize,
        max_depth in 0..7u32,
    ) {
        let config = SpatialConfig { max_objects, max_depth };
        let mut tree = QuadTree::new(config, Rect::new(0.0, 0.0, WORLD, WORLD));
        let entries: Vec<_> = bounds
            .iter()
            .enumerate()
            .map(|(i, &b)| (ObjectHandle::new(i as u32, 0), b))
            .collect();
        for &(h, b) in &entries {
            tree.insert(h, b);
        }
        prop_assert_eq!(tree.len(), entries.len());

        let want = exact(&entries, &query);

        let mut coarse = Vec::new();
        tree.retrieve(&mut coarse, &query);
        let coarse = sorted(coarse);
        for h in &want {
            prop_assert!(coarse.binary_search(h).is_ok(), "retrieve missed {}", h);
        }
        let mut deduped = coarse.clone();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), coarse.len());

        let mut fine = Vec::new();
        tree.retrieve_overlapping(&mut fine, &query);
        prop_assert_eq!(sorted(fine), want);
    }

    /// Above the threshold, candidates are exactly the objects touching the
    /// padded, clamped viewport; a viewport off the world selects nothing.
    #[test]
    fn culled_candidates_lie_in_the_clamped_viewport(
        positions in prop::collection::vec((0.0..WORLD - 8.0, 0.0..WORLD - 8.0), 20..120),
        viewport in rect_strategy(-600.0, WORLD + 600.0)
            .prop_map(|r| Rect::new(r.x, r.y, r.width + 1.0, r.height + 1.0)),
        padding in 0.0..0.5f32,
    ) {
        let config = WorldConfig {
            spatial_threshold: 10,
            viewport_padding: padding,
            ..Default::default()
        };
        let mut world = World::with_config(config).unwrap();
        let world_rect = Rect::new(0.0, 0.0, WORLD, WORLD);
        world.set_bounds(RectBounds::from_rect(world_rect));
        world.set_camera(Rc::new(FixedViewport::new(viewport)));

        let mut placed = Vec::new();
        for &(x, y) in &positions {
            let h = world
                .add(AddObject::new().mutate(move |o| {
                    o.set_position(x, y);
                    o.set_dimensions(8.0, 8.0);
                }))
                .unwrap();
            placed.push((h, Rect::new(x, y, 8.0, 8.0)));
        }

        let report = world.tick(0.016).unwrap();
        prop_assert!(report.culled);
        prop_assert_eq!(report.evicted, 0);

        let want = match expected_region(viewport, padding, world_rect) {
            Some(region) => exact(&placed, &region),
            None => Vec::new(),
        };
        prop_assert_eq!(sorted(world.candidates().to_vec()), want.clone());
        prop_assert_eq!(report.single_updates, want.len());
        for &(h, _) in &placed {
            let selected = want.binary_search(&h).is_ok();
            prop_assert_eq!(world.get(h).map(GameObject::is_updatable), Some(selected));
        }
    }
}
