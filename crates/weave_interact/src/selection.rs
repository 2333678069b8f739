//! Immutable selection snapshots.
//!
//! Every selection change produces a new [`SelectionSnapshot`] (shared,
//! copy-on-write) plus the [`SelectionDiff`] against the previous one. A
//! diff with no additions and no removals is not a change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use weave_core::NodeId;

/// How `select_nodes` combines ids with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Replace the selection.
    #[default]
    Set,
    /// Union with the selection.
    Add,
    /// Flip membership of each id.
    Toggle,
}

/// Versioned, cheaply cloned set of selected node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    ids: Arc<BTreeSet<NodeId>>,
    version: u64,
}

/// Ids added and removed by one selection change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDiff {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl SelectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl SelectionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.ids.iter()
    }

    /// Ids in sorted order.
    pub fn to_vec(&self) -> Vec<NodeId> {
        self.ids.iter().cloned().collect()
    }

    /// Apply `ids` under `mode`. Returns the next snapshot and the diff; the
    /// snapshot is `self` (same version) when nothing changed.
    pub fn apply<'a, I>(&self, ids: I, mode: SelectionMode) -> (SelectionSnapshot, SelectionDiff)
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let mut next: BTreeSet<NodeId> = match mode {
            SelectionMode::Set => BTreeSet::new(),
            SelectionMode::Add | SelectionMode::Toggle => (*self.ids).clone(),
        };
        for id in ids {
            match mode {
                SelectionMode::Set | SelectionMode::Add => {
                    next.insert(id.clone());
                }
                SelectionMode::Toggle => {
                    if !next.remove(id) {
                        next.insert(id.clone());
                    }
                }
            }
        }
        self.replace_with(next)
    }

    /// Snapshot with nothing selected.
    pub fn cleared(&self) -> (SelectionSnapshot, SelectionDiff) {
        self.replace_with(BTreeSet::new())
    }

    fn replace_with(&self, next: BTreeSet<NodeId>) -> (SelectionSnapshot, SelectionDiff) {
        let diff = SelectionDiff {
            added: next.difference(&self.ids).cloned().collect(),
            removed: self.ids.difference(&next).cloned().collect(),
        };
        if diff.is_empty() {
            return (self.clone(), diff);
        }
        let snapshot = SelectionSnapshot {
            ids: Arc::new(next),
            version: self.version + 1,
        };
        (snapshot, diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_replaces() {
        let s0 = SelectionSnapshot::new();
        let (s1, diff) = s0.apply(&ids(&["a", "b"]), SelectionMode::Set);
        assert_eq!(diff.added, ids(&["a", "b"]));
        let (s2, diff) = s1.apply(&ids(&["b", "c"]), SelectionMode::Set);
        assert_eq!(diff.added, ids(&["c"]));
        assert_eq!(diff.removed, ids(&["a"]));
        assert_eq!(s2.to_vec(), ids(&["b", "c"]));
        assert_eq!(s2.version(), 2);
    }

    #[test]
    fn test_add_and_toggle() {
        let (s1, _) = SelectionSnapshot::new().apply(&ids(&["a"]), SelectionMode::Add);
        let (s2, diff) = s1.apply(&ids(&["a", "b"]), SelectionMode::Toggle);
        assert_eq!(diff.added, ids(&["b"]));
        assert_eq!(diff.removed, ids(&["a"]));
        assert!(s2.contains("b") && !s2.contains("a"));
        // older snapshot untouched
        assert!(s1.contains("a"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let (s, diff) = SelectionSnapshot::new().apply(&ids(&["a", "a", "a"]), SelectionMode::Add);
        assert_eq!(s.len(), 1);
        assert_eq!(diff.added, ids(&["a"]));
    }

    #[test]
    fn test_no_change_keeps_version() {
        let s0 = SelectionSnapshot::new();
        let (s1, diff) = s0.cleared();
        assert!(diff.is_empty());
        assert_eq!(s1.version(), 0);

        let (s2, _) = s1.apply(&ids(&["x"]), SelectionMode::Set);
        let (s3, diff) = s2.apply(&ids(&["x"]), SelectionMode::Add);
        assert!(diff.is_empty());
        assert_eq!(s3.version(), s2.version());
    }
}
