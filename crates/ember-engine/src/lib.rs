//! Ember Engine -- the frame driver for an [`ember_world`] world.
//!
//! This crate owns the outer loop: a fixed-timestep [`TickLoop`](tick::TickLoop)
//! that advances the world, records per-tick diagnostics, and hashes world
//! state for determinism checks, plus [`logging::init`] to install a
//! `tracing` subscriber.
//!
//! # Quick Start
//!
//! ```
//! use ember_engine::prelude::*;
//!
//! let mut world = World::new();
//! world.add(AddObject::new().group("players")).unwrap();
//!
//! let mut tick_loop = TickLoop::new(world, TickConfig::default());
//! tick_loop.run_ticks(100).unwrap();
//! assert_eq!(tick_loop.tick_count(), 100);
//! ```

#![deny(unsafe_code)]

pub mod logging;
pub mod tick;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the world crate for convenience.
pub use ember_world;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use ember_world::prelude::*;

    pub use crate::tick::{TickConfig, TickDiagnostics, TickLoop, TickSummary};
}
