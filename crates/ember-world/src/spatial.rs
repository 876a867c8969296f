//! Quad tree used to cull the per-tick update candidates.
//!
//! The tree is rebuilt from scratch every tick: [`QuadTree::clear`] followed
//! by one [`QuadTree::insert`] per live object. Nodes live in a flat arena
//! and the entry buffers of cleared nodes are recycled, so a rebuild at a
//! stable population allocates nothing.
//!
//! Each entry is placed in the deepest node whose region fully contains the
//! object's bounds. Objects straddling a split line stay in the parent;
//! objects outside the root region stay in the root. A root with zero area
//! never splits and behaves as a single bucket.

use serde::{Deserialize, Serialize};

use crate::math::Rect;
use crate::pool::ObjectHandle;

// ---------------------------------------------------------------------------
// SpatialConfig
// ---------------------------------------------------------------------------

/// Split policy for the [`QuadTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Entries a node holds before it splits into four children.
    pub max_objects: usize,
    /// Maximum split depth. The root is depth 0.
    pub max_depth: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            max_objects: 50,
            max_depth: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A handle stored in the tree together with the bounds it was inserted with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    /// The indexed object.
    pub handle: ObjectHandle,
    /// Bounds at insertion time; not updated when the object moves.
    pub bounds: Rect,
}

#[derive(Debug)]
struct Node {
    bounds: Rect,
    depth: u32,
    /// Index of the first of four consecutive children, if split.
    /// Quadrant order: top-left, top-right, bottom-left, bottom-right.
    children: Option<u32>,
    entries: Vec<SpatialEntry>,
}

// ---------------------------------------------------------------------------
// QuadTree
// ---------------------------------------------------------------------------

/// Region quad tree over object bounds. Holds handles only; never owns
/// objects.
#[derive(Debug)]
pub struct QuadTree {
    config: SpatialConfig,
    nodes: Vec<Node>,
    spare_entries: Vec<Vec<SpatialEntry>>,
    len: usize,
}

impl QuadTree {
    /// Create an empty tree over `bounds`.
    pub fn new(config: SpatialConfig, bounds: Rect) -> Self {
        let mut tree = Self {
            config,
            nodes: Vec::new(),
            spare_entries: Vec::new(),
            len: 0,
        };
        tree.clear(bounds);
        tree
    }

    /// Drop every node and entry and restart with a single root over
    /// `bounds`.
    pub fn clear(&mut self, bounds: Rect) {
        for mut node in self.nodes.drain(..) {
            node.entries.clear();
            self.spare_entries.push(node.entries);
        }
        let entries = self.spare_entries.pop().unwrap_or_default();
        self.nodes.push(Node {
            bounds,
            depth: 0,
            children: None,
            entries,
        });
        self.len = 0;
    }

    /// Insert `handle` with its current `bounds`.
    pub fn insert(&mut self, handle: ObjectHandle, bounds: Rect) {
        let entry = SpatialEntry { handle, bounds };
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if let Some(first) = node.children {
                if let Some(q) = quadrant_of(&node.bounds, &bounds) {
                    idx = first as usize + q;
                    continue;
                }
            }
            self.nodes[idx].entries.push(entry);
            self.len += 1;
            if self.should_split(idx) {
                self.split(idx);
            }
            return;
        }
    }

    /// Append every entry of every node whose region intersects `query`.
    ///
    /// The result may contain handles whose bounds do not touch `query`;
    /// use [`retrieve_overlapping`](Self::retrieve_overlapping) for the
    /// exact set. The root is always searched, since it holds the objects
    /// that lie outside the tree's bounds.
    pub fn retrieve(&self, out: &mut Vec<ObjectHandle>, query: &Rect) {
        self.visit(0, query, &mut |entry: &SpatialEntry| out.push(entry.handle));
    }

    /// Like [`retrieve`](Self::retrieve), but only appends entries whose
    /// bounds overlap `query` (edges inclusive).
    pub fn retrieve_overlapping(&self, out: &mut Vec<ObjectHandle>, query: &Rect) {
        self.visit(0, query, &mut |entry: &SpatialEntry| {
            if entry.bounds.overlaps(query) {
                out.push(entry.handle);
            }
        });
    }

    /// Number of inserted entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest split level currently present.
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Region covered by the root.
    pub fn bounds(&self) -> Rect {
        self.nodes[0].bounds
    }

    /// Active split policy.
    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    // -- internals ----------------------------------------------------------

    fn visit(&self, idx: usize, query: &Rect, f: &mut impl FnMut(&SpatialEntry)) {
        let node = &self.nodes[idx];
        for entry in &node.entries {
            f(entry);
        }
        if let Some(first) = node.children {
            for child in first as usize..first as usize + 4 {
                if self.nodes[child].bounds.overlaps(query) {
                    self.visit(child, query, &mut *f);
                }
            }
        }
    }

    fn should_split(&self, idx: usize) -> bool {
        let node = &self.nodes[idx];
        node.children.is_none()
            && node.entries.len() > self.config.max_objects
            && node.depth < self.config.max_depth
            && node.bounds.has_area()
    }

    /// Create four children under `idx` and push down every entry that fits
    /// wholly inside one of them. Recurses into children that overflow.
    fn split(&mut self, idx: usize) {
        let bounds = self.nodes[idx].bounds;
        let depth = self.nodes[idx].depth + 1;
        let first = self.nodes.len();
        for child_bounds in quadrants(&bounds) {
            let entries = self.spare_entries.pop().unwrap_or_default();
            self.nodes.push(Node {
                bounds: child_bounds,
                depth,
                children: None,
                entries,
            });
        }
        self.nodes[idx].children = Some(first as u32);

        let mut pending = std::mem::take(&mut self.nodes[idx].entries);
        let mut kept = self.spare_entries.pop().unwrap_or_default();
        for entry in pending.drain(..) {
            match quadrant_of(&bounds, &entry.bounds) {
                Some(q) => self.nodes[first + q].entries.push(entry),
                None => kept.push(entry),
            }
        }
        self.nodes[idx].entries = kept;
        self.spare_entries.push(pending);

        for child in first..first + 4 {
            if self.should_split(child) {
                self.split(child);
            }
        }
    }
}

/// The four equal sub-rectangles of `bounds`, in quadrant order.
fn quadrants(bounds: &Rect) -> [Rect; 4] {
    let hw = bounds.width / 2.0;
    let hh = bounds.height / 2.0;
    let mx = bounds.x + hw;
    let my = bounds.y + hh;
    [
        Rect::new(bounds.x, bounds.y, hw, hh),
        Rect::new(mx, bounds.y, hw, hh),
        Rect::new(bounds.x, my, hw, hh),
        Rect::new(mx, my, hw, hh),
    ]
}

/// Quadrant of `parent` that fully contains `rect`, if any.
fn quadrant_of(parent: &Rect, rect: &Rect) -> Option<usize> {
    quadrants(parent)
        .iter()
        .position(|q| q.contains_rect(rect))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
