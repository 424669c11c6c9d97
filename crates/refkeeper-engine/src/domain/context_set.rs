//! # Context Set
//!
//! Ordered set of usage contexts with a "tried" cursor.
//!
//! Insertion order is preserved and duplicates are rejected. During a repair
//! attempt [`ContextSet::next`] hands out untried contexts starting from the
//! most recently added one, so fresher provenance is consulted first. Sets are
//! small (a handful of contexts per file), so a flat vector is enough.

use super::value_objects::UsageContextId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    id: UsageContextId,
    tried: bool,
}

/// Ordered, duplicate-free set of usage contexts.
#[derive(Clone, Debug, Default)]
pub struct ContextSet {
    entries: Vec<Entry>,
}

impl ContextSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`. Returns false if it was already present.
    ///
    /// A present id keeps its position and its tried flag.
    pub fn add(&mut self, id: UsageContextId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push(Entry { id, tried: false });
        true
    }

    /// Remove `id`, keeping the order of the rest. Returns false if absent.
    pub fn remove(&mut self, id: UsageContextId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Membership test.
    pub fn contains(&self, id: UsageContextId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Number of contexts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no contexts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an untried context remains in the current attempt.
    pub fn has_next(&self) -> bool {
        self.entries.iter().any(|entry| !entry.tried)
    }

    /// Most recently added untried context, marked as tried.
    pub fn next(&mut self) -> Option<UsageContextId> {
        let entry = self.entries.iter_mut().rev().find(|entry| !entry.tried)?;
        entry.tried = true;
        Some(entry.id)
    }

    /// Start a new attempt: every context becomes untried.
    pub fn reset_position(&mut self) {
        for entry in &mut self.entries {
            entry.tried = false;
        }
    }

    /// Number of contexts already tried in the current attempt.
    pub fn tried_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.tried).count()
    }

    /// Append the contexts of `other` that are not present yet.
    ///
    /// With `keep_progress`, a context tried in `other` stays tried here,
    /// whether it is appended or already present; otherwise the flags of
    /// `self` are left alone and appended contexts arrive untried.
    pub fn merge(&mut self, other: ContextSet, keep_progress: bool) {
        for entry in other.entries {
            match self.entries.iter_mut().find(|existing| existing.id == entry.id) {
                Some(existing) => {
                    if keep_progress {
                        existing.tried |= entry.tried;
                    }
                }
                None => self.entries.push(Entry {
                    id: entry.id,
                    tried: keep_progress && entry.tried,
                }),
            }
        }
    }

    /// Snapshot of the members in insertion order.
    pub fn ids(&self) -> Vec<UsageContextId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }
}
