//! Small 2D value types shared by objects, bounds, and the spatial index.
//!
//! Coordinates follow the screen convention used by the rest of the crate:
//! `x` grows to the right and `y` grows downward, so a rectangle's `top` is
//! its minimum `y`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D vector of `f32` components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    /// The unit scale `(1, 1)`.
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    /// Construct a vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// An axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Horizontal extent. Never negative for rectangles built by this crate.
    pub width: f32,
    /// Vertical extent.
    pub height: f32,
}

impl Rect {
    /// Construct a rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (`x + width`).
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Whether the rectangle has a positive area.
    #[inline]
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Inclusive overlap test. Rectangles that only share an edge overlap,
    /// and a zero-sized rectangle overlaps anything that contains its point.
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Whether `other` lies entirely within `self` (edges inclusive).
    #[inline]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow the rectangle by `fraction` of its own size on every side.
    ///
    /// A fraction of `0.1` on a 20x20 rectangle at the origin yields a 24x24
    /// rectangle at `(-2, -2)`.
    pub fn padded(&self, fraction: f32) -> Rect {
        let dx = self.width * fraction;
        let dy = self.height * fraction;
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + dx * 2.0,
            self.height + dy * 2.0,
        )
    }

    /// Clip the rectangle to `limits`, or `None` when the two do not
    /// overlap. Rectangles that only touch clip to a zero-width or
    /// zero-height edge.
    pub fn clamped_to(&self, limits: &Rect) -> Option<Rect> {
        if !self.overlaps(limits) {
            return None;
        }
        let x = self.x.max(limits.x);
        let y = self.y.max(limits.y);
        let right = self.right().min(limits.right());
        let bottom = self.bottom().min(limits.bottom());
        Some(Rect::new(x, y, (right - x).max(0.0), (bottom - y).max(0.0)))
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
    /// Alpha, `1.0` being opaque.
    pub a: f32,
}

impl Color {
    /// Opaque white, the default tint of every object.
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    /// Construct a color.
    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
