//! Game objects and their identifiers.
//!
//! A [`GameObject`] is a plain data record owned by the world's
//! [`ObjectPool`](crate::pool::ObjectPool). Callers never own one directly:
//! they hold an [`ObjectHandle`](crate::pool::ObjectHandle) and borrow the
//! object through the world when they need it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Color, Rect, Vec2};

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// The unique, caller-visible identity of a live object.
///
/// Ids are assigned from a sequential generator when an object is added,
/// unless the request names one with [`AddObject::id`](crate::command::AddObject::id). `0` is reserved for objects
/// that sit unused in the pool.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// The id carried by reset (unassigned) objects.
    pub const UNASSIGNED: ObjectId = ObjectId(0);

    /// Construct an id from its raw value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Whether this is [`ObjectId::UNASSIGNED`].
    #[inline]
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status bag
// ---------------------------------------------------------------------------

/// Key into an object's [`StatusBag`].
///
/// Keys are small integers declared as constants by the code that owns the
/// status, e.g. `const HIT_POINTS: StatusKey = StatusKey(1);`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusKey(pub u16);

/// A value stored in a [`StatusBag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl StatusValue {
    /// The boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatusValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StatusValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float payload, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StatusValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The text payload, if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StatusValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Typed key-value storage for caller-defined per-object status.
///
/// Cleared when the owning object returns to the pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBag {
    entries: BTreeMap<StatusKey, StatusValue>,
}

impl StatusBag {
    /// Look up a value.
    pub fn get(&self, key: StatusKey) -> Option<&StatusValue> {
        self.entries.get(&key)
    }

    /// Insert or overwrite a value, returning the previous one.
    pub fn set(&mut self, key: StatusKey, value: StatusValue) -> Option<StatusValue> {
        self.entries.insert(key, value)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: StatusKey) -> Option<StatusValue> {
        self.entries.remove(&key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: StatusKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Boolean lookup with a fallback for absent or non-boolean entries.
    pub fn get_bool_or(&self, key: StatusKey, default: bool) -> bool {
        self.get(key)
            .and_then(StatusValue::as_bool)
            .unwrap_or(default)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// GameObject
// ---------------------------------------------------------------------------

/// A single simulated object.
///
/// Every field has a default that [`reset`](Self::reset) restores when the
/// object is freed back to the pool: zero position and dimensions, unit
/// scale, white color, active, not persistent, an empty status bag and an
/// unassigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    id: ObjectId,
    position: Vec2,
    last_position: Vec2,
    dimensions: Vec2,
    /// Render scale. Does not affect bounds.
    pub scale: Vec2,
    /// Render tint.
    pub color: Color,
    /// Render offset relative to `position`. Does not affect bounds.
    pub offset: Vec2,
    /// Caller-defined type tag.
    pub kind: u32,
    /// Inactive objects still receive single-object updates but take no part
    /// in pairwise dispatch.
    pub active: bool,
    /// Persistent objects survive leaving the world bounds.
    pub persistent: bool,
    /// Whether the object was in the candidate set after the last tick.
    pub(crate) updatable: bool,
    /// Caller-defined status.
    pub status: StatusBag,
}

impl GameObject {
    /// A fresh object with every field at its default.
    pub fn new() -> Self {
        Self {
            id: ObjectId::UNASSIGNED,
            position: Vec2::ZERO,
            last_position: Vec2::ZERO,
            dimensions: Vec2::ZERO,
            scale: Vec2::ONE,
            color: Color::WHITE,
            offset: Vec2::ZERO,
            kind: 0,
            active: true,
            persistent: false,
            updatable: true,
            status: StatusBag::default(),
        }
    }

    /// Restore every field to its default. Called by the pool on free.
    pub fn reset(&mut self) {
        self.id = ObjectId::UNASSIGNED;
        self.position = Vec2::ZERO;
        self.last_position = Vec2::ZERO;
        self.dimensions = Vec2::ZERO;
        self.scale = Vec2::ONE;
        self.color = Color::WHITE;
        self.offset = Vec2::ZERO;
        self.kind = 0;
        self.active = true;
        self.persistent = false;
        self.updatable = true;
        // clear() keeps the map's allocation for the next user of this slot
        self.status.clear();
    }

    // -- identity -----------------------------------------------------------

    /// The object's id.
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Stamp the id the world registered this object under. Callers choose
    /// an id through [`AddObject::id`](crate::command::AddObject::id).
    #[inline]
    pub(crate) fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }

    // -- geometry -----------------------------------------------------------

    /// Current top-left position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Position before the most recent [`set_position`](Self::set_position).
    #[inline]
    pub fn last_position(&self) -> Vec2 {
        self.last_position
    }

    /// Move to an absolute position, remembering the previous one.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.last_position = self.position;
        self.position = Vec2::new(x, y);
    }

    /// Move relative to the current position.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        self.set_position(self.position.x + dx, self.position.y + dy);
    }

    /// Width and height.
    #[inline]
    pub fn dimensions(&self) -> Vec2 {
        self.dimensions
    }

    /// Set width and height.
    pub fn set_dimensions(&mut self, width: f32, height: f32) {
        self.dimensions = Vec2::new(width, height);
    }

    /// X coordinate of the left edge.
    #[inline]
    pub fn left(&self) -> f32 {
        self.position.x
    }

    /// Y coordinate of the top edge.
    #[inline]
    pub fn top(&self) -> f32 {
        self.position.y
    }

    /// `left() + width()`.
    #[inline]
    pub fn right(&self) -> f32 {
        self.position.x + self.dimensions.x
    }

    /// `top() + height()`.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.position.y + self.dimensions.y
    }

    /// Horizontal extent.
    #[inline]
    pub fn width(&self) -> f32 {
        self.dimensions.x
    }

    /// Vertical extent.
    #[inline]
    pub fn height(&self) -> f32 {
        self.dimensions.y
    }

    /// The object's axis-aligned bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.dimensions.x,
            self.dimensions.y,
        )
    }

    // -- status -------------------------------------------------------------

    /// Whether the object was selected for update on the last tick.
    #[inline]
    pub fn is_updatable(&self) -> bool {
        self.updatable
    }
}

impl Default for GameObject {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
