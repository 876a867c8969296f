//! Named, order-preserving partitions of the live objects.
//!
//! Groups are independent of space: they exist so callers can address and
//! clear related objects together (all bullets, all tiles of a map layer).

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::pool::ObjectHandle;

// ---------------------------------------------------------------------------
// GroupKey
// ---------------------------------------------------------------------------

/// Opaque group name, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Cow<'static, str>);

impl GroupKey {
    /// The group objects join when the caller names none.
    pub const DEFAULT: GroupKey = GroupKey(Cow::Borrowed("default"));

    /// A key backed by a static string, usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The key's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GroupKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&'static str> for GroupKey {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for GroupKey {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// GroupIndex
// ---------------------------------------------------------------------------

/// Maps each group key to its members in insertion order.
///
/// Iteration across groups follows key order, so [`all`](Self::all) is
/// deterministic for a given sequence of insertions.
#[derive(Debug, Default)]
pub struct GroupIndex {
    groups: BTreeMap<GroupKey, Vec<ObjectHandle>>,
    membership: HashMap<ObjectHandle, GroupKey>,
}

impl GroupIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handle` to the group `key`, creating the group if needed.
    ///
    /// An object belongs to at most one group; adding a member of another
    /// group moves it.
    pub fn add_to_group(&mut self, key: GroupKey, handle: ObjectHandle) {
        if self.membership.contains_key(&handle) {
            self.remove(handle);
        }
        self.groups.entry(key.clone()).or_default().push(handle);
        self.membership.insert(handle, key);
    }

    /// Remove `handle` from whichever group holds it, preserving the order of
    /// the remaining members. The group entry stays, even when emptied.
    pub fn remove(&mut self, handle: ObjectHandle) -> Option<GroupKey> {
        let key = self.membership.remove(&handle)?;
        if let Some(members) = self.groups.get_mut(&key) {
            if let Some(pos) = members.iter().position(|h| *h == handle) {
                members.remove(pos);
            }
        }
        Some(key)
    }

    /// Members of `key` in insertion order.
    pub fn get(&self, key: &GroupKey) -> Option<&[ObjectHandle]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Delete the group entry and forget its remaining members.
    ///
    /// Callers that need per-object teardown remove the members first.
    pub fn remove_group(&mut self, key: &GroupKey) -> Option<Vec<ObjectHandle>> {
        let members = self.groups.remove(key)?;
        for handle in &members {
            self.membership.remove(handle);
        }
        Some(members)
    }

    /// Group holding `handle`.
    pub fn group_of(&self, handle: ObjectHandle) -> Option<&GroupKey> {
        self.membership.get(&handle)
    }

    /// Every member of every group: groups in key order, members in
    /// insertion order.
    pub fn all(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.groups.values().flat_map(|members| members.iter().copied())
    }

    /// Group keys in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> + '_ {
        self.groups.keys()
    }

    /// Total number of members across all groups.
    pub fn len(&self) -> usize {
        self.membership.len()
    }

    /// Whether no group has members.
    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    /// Drop every group.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.membership.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn h(i: u32) -> ObjectHandle {
        ObjectHandle::new(i, 0)
    }

    #[test]
    fn members_keep_insertion_order() {
        let mut idx = GroupIndex::new();
        let g = GroupKey::from("g");
        idx.add_to_group(g.clone(), h(3));
        idx.add_to_group(g.clone(), h(1));
        idx.add_to_group(g.clone(), h(2));
        assert_eq!(idx.get(&g).unwrap(), &[h(3), h(1), h(2)]);

        idx.remove(h(1));
        assert_eq!(idx.get(&g).unwrap(), &[h(3), h(2)]);
    }

    #[test]
    fn object_belongs_to_one_group() {
        let mut idx = GroupIndex::new();
        let a = GroupKey::from("a");
        let b = GroupKey::from("b");
        idx.add_to_group(a.clone(), h(0));
        idx.add_to_group(b.clone(), h(0));

        assert!(idx.get(&a).unwrap().is_empty());
        assert_eq!(idx.get(&b).unwrap(), &[h(0)]);
        assert_eq!(idx.group_of(h(0)), Some(&b));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn all_spans_groups_in_key_order() {
        let mut idx = GroupIndex::new();
        idx.add_to_group(GroupKey::from("zeta"), h(0));
        idx.add_to_group(GroupKey::from("alpha"), h(1));
        idx.add_to_group(GroupKey::from("alpha"), h(2));
        let all: Vec<_> = idx.all().collect();
        assert_eq!(all, vec![h(1), h(2), h(0)]);
    }

    #[test]
    fn remove_group_drops_entry_and_membership() {
        let mut idx = GroupIndex::new();
        let g = GroupKey::from("g");
        idx.add_to_group(g.clone(), h(0));
        assert_eq!(idx.remove_group(&g), Some(vec![h(0)]));
        assert!(idx.get(&g).is_none());
        assert!(idx.group_of(h(0)).is_none());
        assert!(idx.remove(h(0)).is_none());
    }

    #[test]
    fn keys_compare_by_value() {
        let owned = GroupKey::from(String::from("enemies"));
        let borrowed = GroupKey::from_static("enemies");
        assert_eq!(owned, borrowed);
        assert_eq!(GroupKey::default().as_str(), "default");
    }
}
