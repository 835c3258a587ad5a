//! Per-session undo information
//!
//! An [`UndoState`] is the diff between an index's live contents and its
//! contents when the session began:
//!
//! - `old_values`: before-images of records modified this session
//! - `removed_values`: before-images of records removed this session
//! - `new_ids`: ids created this session
//!
//! A record id appears in at most one of the three sets.

use std::collections::{BTreeMap, BTreeSet};

/// Undo information for one open session on one index.
#[derive(Debug, Clone)]
pub struct UndoState<T> {
    pub(crate) old_values: BTreeMap<i64, T>,
    pub(crate) removed_values: BTreeMap<i64, T>,
    pub(crate) new_ids: BTreeSet<i64>,
    pub(crate) old_next_id: i64,
    pub(crate) revision: i64,
}

impl<T> UndoState<T> {
    pub(crate) fn new(old_next_id: i64, revision: i64) -> Self {
        Self {
            old_values: BTreeMap::new(),
            removed_values: BTreeMap::new(),
            new_ids: BTreeSet::new(),
            old_next_id,
            revision,
        }
    }

    /// Before-images of modified records
    pub fn old_values(&self) -> &BTreeMap<i64, T> {
        &self.old_values
    }

    /// Before-images of removed records
    pub fn removed_values(&self) -> &BTreeMap<i64, T> {
        &self.removed_values
    }

    /// Ids created this session
    pub fn new_ids(&self) -> &BTreeSet<i64> {
        &self.new_ids
    }

    /// Id allocator position when the session began
    pub fn old_next_id(&self) -> i64 {
        self.old_next_id
    }

    /// Revision this session opened
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// True if any of the three sets mentions `id`
    pub fn touches(&self, id: i64) -> bool {
        self.new_ids.contains(&id)
            || self.old_values.contains_key(&id)
            || self.removed_values.contains_key(&id)
    }

    /// True if the session changed nothing
    pub fn is_empty(&self) -> bool {
        self.old_values.is_empty() && self.removed_values.is_empty() && self.new_ids.is_empty()
    }
}
