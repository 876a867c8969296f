//! Fixed-timestep tick loop driving a [`World`].
//!
//! The [`TickLoop`] is the caller-owned frame driver. Each tick it hands the
//! configured time step to [`World::tick`], which runs the scheduler phases
//! and flushes deferred commands, then advances the tick counter.
//!
//! Simulation time is derived from the tick counter, never accumulated, so it
//! does not drift over long runs.
//!
//! # Example
//!
//! ```
//! use ember_engine::tick::{TickConfig, TickLoop};
//! use ember_world::prelude::*;
//!
//! let mut world = World::new();
//! world.add_object().unwrap();
//!
//! let config = TickConfig { fixed_dt: 1.0 / 30.0 };
//! let mut tick_loop = TickLoop::new(world, config);
//!
//! let summary = tick_loop.run_ticks(10).unwrap();
//! assert_eq!(summary.ticks, 10);
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use anyhow::Context;
use ember_world::world::{TickReport, World};
use ember_world::WorldError;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// Defaults to 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing and scheduler output for the last completed tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time spent in [`World::tick`].
    pub total_time: Duration,
    /// What the scheduler did.
    pub last_report: TickReport,
}

/// Totals over a [`TickLoop::run_ticks`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Ticks completed.
    pub ticks: u64,
    /// Objects dispatched to `on_update`, summed over the batch.
    pub single_updates: usize,
    /// Pairs dispatched to `on_pair_update`, summed over the batch.
    pub pair_updates: usize,
    /// Objects evicted for leaving the world bounds.
    pub evicted: usize,
    /// Deferred commands that changed the world.
    pub applied: usize,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The deterministic fixed-timestep driver.
///
/// Given the same initial world, the same listeners, and the same sequence
/// of deltas, two loops end in the same state; [`state_hash`](Self::state_hash)
/// makes that checkable.
pub struct TickLoop {
    world: World,
    tick_counter: u64,
    fixed_dt: f64,
    last_diagnostics: TickDiagnostics,
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick_counter", &self.tick_counter)
            .field("fixed_dt", &self.fixed_dt)
            .field("world", &self.world)
            .finish()
    }
}

impl TickLoop {
    /// Create a tick loop owning `world`.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(world: World, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            world,
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Run one tick with the fixed time step.
    ///
    /// # Errors
    ///
    /// The listener failure that aborted the tick. The tick counter does not
    /// advance for an aborted tick.
    pub fn tick(&mut self) -> Result<TickReport, WorldError> {
        self.tick_with(self.fixed_dt)
    }

    /// Run one tick with an explicit time step, for callers that drive the
    /// world from a variable frame clock.
    ///
    /// # Errors
    ///
    /// See [`tick`](Self::tick).
    pub fn tick_with(&mut self, delta: f64) -> Result<TickReport, WorldError> {
        let start = Instant::now();
        let report = self.world.tick(delta as f32)?;
        self.tick_counter += 1;
        trace!(tick = self.tick_counter, candidates = report.candidates, "tick");
        self.last_diagnostics = TickDiagnostics {
            total_time: start.elapsed(),
            last_report: report.clone(),
        };
        Ok(report)
    }

    /// Run `count` fixed-step ticks, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The failing tick's error, with the tick index attached as context.
    pub fn run_ticks(&mut self, count: u64) -> anyhow::Result<TickSummary> {
        let mut summary = TickSummary::default();
        for _ in 0..count {
            let index = self.tick_counter;
            let report = self
                .tick()
                .with_context(|| format!("tick {index} aborted"))?;
            summary.ticks += 1;
            summary.single_updates += report.single_updates;
            summary.pair_updates += report.pair_updates;
            summary.evicted += report.evicted;
            summary.applied += report.applied.applied;
        }
        debug!(
            ticks = summary.ticks,
            applied = summary.applied,
            evicted = summary.evicted,
            "batch complete"
        );
        Ok(summary)
    }

    // -- accessors ----------------------------------------------------------

    /// The number of ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// The current simulation time in seconds, as `tick_count * fixed_dt`.
    ///
    /// Ticks driven through [`tick_with`](Self::tick_with) count as one fixed
    /// step each.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    /// The fixed time step in seconds per tick.
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Read-only access to the world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, for setup between ticks.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Give the world back.
    pub fn into_world(self) -> World {
        self.world
    }

    /// Diagnostics from the last completed tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    /// Hash the observable state of every attached object in group order.
    ///
    /// Covers ids, positions, dimensions, kind, and the active, persistent,
    /// and updatable flags. Returns a lowercase hex digest.
    pub fn state_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let objects = self.world.objects();
        hasher.update(&(objects.len() as u64).to_le_bytes());
        for object in objects {
            hasher.update(&object.id().to_raw().to_le_bytes());
            for value in [object.left(), object.top(), object.width(), object.height()] {
                hasher.update(&value.to_bits().to_le_bytes());
            }
            hasher.update(&object.kind.to_le_bytes());
            hasher.update(&[
                u8::from(object.active),
                u8::from(object.persistent),
                u8::from(object.is_updatable()),
            ]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ember_world::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Moves every object right by one unit per second.
    struct Drift;

    impl WorldListener for Drift {
        fn on_update(&mut self, o: &mut GameObject, delta: f32, _: &mut Commands) -> ListenerResult {
            o.move_by(delta, 0.0);
            Ok(())
        }
    }

    fn drifting_loop(objects: usize) -> TickLoop {
        let mut world = World::new();
        world.add_listener(Drift);
        for _ in 0..objects {
            world.add_object().unwrap();
        }
        TickLoop::new(world, TickConfig { fixed_dt: 0.5 })
    }

    #[test]
    fn new_tick_loop_starts_at_zero() {
        let tick_loop = TickLoop::new(World::new(), TickConfig::default());
        assert_eq!(tick_loop.tick_count(), 0);
        assert_eq!(tick_loop.sim_time(), 0.0);
    }

    #[test]
    fn default_config_is_60hz() {
        let config = TickConfig::default();
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn zero_dt_panics() {
        let _ = TickLoop::new(World::new(), TickConfig { fixed_dt: 0.0 });
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn nan_dt_panics() {
        let _ = TickLoop::new(World::new(), TickConfig { fixed_dt: f64::NAN });
    }

    #[test]
    fn tick_passes_fixed_dt_to_listeners() {
        let mut tick_loop = drifting_loop(1);
        tick_loop.tick().unwrap();
        tick_loop.tick().unwrap();
        let x = tick_loop.world().objects()[0].left();
        assert_eq!(x, 1.0);
        assert_eq!(tick_loop.sim_time(), 1.0);
    }

    #[test]
    fn tick_with_uses_explicit_delta() {
        let mut tick_loop = drifting_loop(1);
        tick_loop.tick_with(0.25).unwrap();
        assert_eq!(tick_loop.world().objects()[0].left(), 0.25);
        assert_eq!(tick_loop.tick_count(), 1);
    }

    #[test]
    fn run_ticks_sums_reports() {
        let mut tick_loop = drifting_loop(3);
        let summary = tick_loop.run_ticks(4).unwrap();
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.single_updates, 12);
        assert_eq!(summary.pair_updates, 24);
        assert_eq!(tick_loop.last_diagnostics().last_report.candidates, 3);
    }

    #[test]
    fn run_ticks_stops_at_failure_with_context() {
        struct FailOnThird(Rc<Cell<u32>>);
        impl WorldListener for FailOnThird {
            fn on_update(&mut self, _: &mut GameObject, _: f32, _: &mut Commands) -> ListenerResult {
                self.0.set(self.0.get() + 1);
                if self.0.get() == 3 {
                    return Err("third update".into());
                }
                Ok(())
            }
        }

        let calls = Rc::new(Cell::new(0));
        let mut world = World::new();
        world.add_listener(FailOnThird(Rc::clone(&calls)));
        world.add_object().unwrap();
        let mut tick_loop = TickLoop::new(world, TickConfig::default());

        let err = tick_loop.run_ticks(10).unwrap_err();
        assert_eq!(err.to_string(), "tick 2 aborted");
        assert!(err.downcast_ref::<WorldError>().is_some());
        assert_eq!(tick_loop.tick_count(), 2);
    }

    #[test]
    fn state_hash_tracks_object_state() {
        let mut a = drifting_loop(2);
        let b = drifting_loop(2);
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.state_hash().len(), 64);

        a.tick().unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn diagnostics_default_before_first_tick() {
        let tick_loop = drifting_loop(1);
        assert_eq!(tick_loop.last_diagnostics().last_report, TickReport::default());
        assert_eq!(tick_loop.last_diagnostics().total_time, Duration::ZERO);
    }
}
