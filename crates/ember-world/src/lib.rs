//! Ember World -- pooled game objects with grouping, deferred mutation, and
//! camera-culled per-tick updates.
//!
//! A [`World`](world::World) owns every live [`GameObject`](object::GameObject).
//! Objects come from a recycling pool, are indexed by a unique id and by
//! named group, and are driven once per tick by registered listeners. Large
//! populations are culled against the camera through a quad tree that is
//! rebuilt every tick.
//!
//! # Quick Start
//!
//! ```
//! use ember_world::prelude::*;
//!
//! struct Gravity;
//!
//! impl WorldListener for Gravity {
//!     fn on_update(&mut self, o: &mut GameObject, delta: f32, _: &mut Commands) -> ListenerResult {
//!         o.move_by(0.0, 9.81 * delta);
//!         Ok(())
//!     }
//! }
//!
//! let mut world = World::new();
//! world.add_listener(Gravity);
//! let ball = world.add(AddObject::new().group("balls")).unwrap();
//!
//! world.tick(1.0).unwrap();
//! assert_eq!(world.get(ball).unwrap().top(), 9.81);
//! ```

#![deny(unsafe_code)]

pub mod bounds;
pub mod command;
pub mod config;
pub mod group;
pub mod identity;
pub mod listener;
pub mod math;
pub mod object;
pub mod pool;
pub mod spatial;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// An object with this id is already registered.
    #[error("object {id} already exists")]
    DuplicateIdentity { id: object::ObjectId },

    /// A listener callback returned an error.
    #[error("listener failed during {event}")]
    ListenerFailure {
        event: listener::ListenerEvent,
        #[source]
        source: listener::BoxError,
    },

    /// A configuration value is out of range.
    #[error("invalid config field '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// A configuration document could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::bounds::{Camera, FixedViewport, RectBounds, Unbounded, WorldBounds};
    pub use crate::command::{AddObject, ApplyReport, Command, CommandKind, Commands, Target};
    pub use crate::config::WorldConfig;
    pub use crate::group::{GroupIndex, GroupKey};
    pub use crate::identity::IdentityRegistry;
    pub use crate::listener::{BoxError, ListenerEvent, ListenerId, ListenerResult, WorldListener};
    pub use crate::math::{Color, Rect, Vec2};
    pub use crate::object::{GameObject, ObjectId, StatusBag, StatusKey, StatusValue};
    pub use crate::pool::{ObjectHandle, ObjectPool, PoolStats};
    pub use crate::spatial::{QuadTree, SpatialConfig};
    pub use crate::world::{TickReport, World};
    pub use crate::WorldError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
