//! External collaborators consumed by the scheduler: the world-bounds policy
//! and the camera viewport.
//!
//! Neither is owned logic of the world. The camera is tracked elsewhere; the
//! world only reads its viewport rectangle once per tick.

use std::cell::Cell;

use crate::math::Rect;
use crate::object::GameObject;

// ---------------------------------------------------------------------------
// WorldBounds
// ---------------------------------------------------------------------------

/// Decides which objects are inside the world and how large the world is.
///
/// Objects that are out of bounds and not persistent are evicted when they
/// show up in the candidate set.
pub trait WorldBounds {
    /// Whether `object` is inside the world.
    fn is_in_bounds(&self, object: &GameObject) -> bool;

    /// Width of the world. Zero means the world has no extent and culling
    /// falls back to the padded viewport alone.
    fn world_width(&self) -> f32;

    /// Height of the world.
    fn world_height(&self) -> f32;

    /// Left edge of the world.
    fn world_offset_x(&self) -> f32 {
        0.0
    }

    /// Top edge of the world.
    fn world_offset_y(&self) -> f32 {
        0.0
    }

    /// The world rectangle. Also the root region of the spatial index.
    fn rect(&self) -> Rect {
        Rect::new(
            self.world_offset_x(),
            self.world_offset_y(),
            self.world_width(),
            self.world_height(),
        )
    }
}

/// The default policy: everything is in bounds and the world has no extent.
///
/// With zero extent the spatial index degenerates to a single bucket and the
/// camera query is not clamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl WorldBounds for Unbounded {
    fn is_in_bounds(&self, _object: &GameObject) -> bool {
        true
    }

    fn world_width(&self) -> f32 {
        0.0
    }

    fn world_height(&self) -> f32 {
        0.0
    }
}

/// A rectangular world. An object is in bounds while its bounds overlap the
/// rectangle, edges included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectBounds {
    pub area: Rect,
}

impl RectBounds {
    /// A world spanning `(0, 0)` to `(width, height)`.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            area: Rect::new(0.0, 0.0, width, height),
        }
    }

    /// A world covering `area`.
    pub fn from_rect(area: Rect) -> Self {
        Self { area }
    }
}

impl WorldBounds for RectBounds {
    fn is_in_bounds(&self, object: &GameObject) -> bool {
        self.area.overlaps(&object.bounds())
    }

    fn world_width(&self) -> f32 {
        self.area.width
    }

    fn world_height(&self) -> f32 {
        self.area.height
    }

    fn world_offset_x(&self) -> f32 {
        self.area.x
    }

    fn world_offset_y(&self) -> f32 {
        self.area.y
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Read-only view of the camera the scheduler culls against.
pub trait Camera {
    /// Left edge of the visible area in world units.
    fn left(&self) -> f32;

    /// Top edge of the visible area in world units.
    fn top(&self) -> f32;

    /// Visible width after zoom.
    fn scaled_width(&self) -> f32;

    /// Visible height after zoom.
    fn scaled_height(&self) -> f32;

    /// The visible area as a rectangle.
    fn viewport(&self) -> Rect {
        Rect::new(
            self.left(),
            self.top(),
            self.scaled_width(),
            self.scaled_height(),
        )
    }
}

/// A camera whose viewport is set directly by the caller.
///
/// Interior mutability lets the application keep moving a camera it has
/// shared with the world behind an `Rc`.
#[derive(Debug, Default)]
pub struct FixedViewport {
    rect: Cell<Rect>,
}

impl FixedViewport {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect: Cell::new(rect),
        }
    }

    /// Move or resize the viewport.
    pub fn set(&self, rect: Rect) {
        self.rect.set(rect);
    }
}

impl Camera for FixedViewport {
    fn left(&self) -> f32 {
        self.rect.get().x
    }

    fn top(&self) -> f32 {
        self.rect.get().y
    }

    fn scaled_width(&self) -> f32 {
        self.rect.get().width
    }

    fn scaled_height(&self) -> f32 {
        self.rect.get().height
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
