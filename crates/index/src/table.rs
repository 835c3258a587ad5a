//! Multi-ordered record table
//!
//! [`Table`] is the live contents of one index: a primary map by id plus
//! every declared secondary ordering, kept in lockstep. It has no notion of
//! sessions; [`VersionedIndex`](crate::VersionedIndex) layers the undo log on
//! top.
//!
//! Every mutating method checks all orderings before touching any of them,
//! so a rejected call leaves the table exactly as it was.

use chainbase_core::{Object, SecondaryIndices, SecondaryKey, UniqueIndex};
use std::collections::BTreeMap;

/// Name reported when two records share an id.
pub const PRIMARY_ORDERING: &str = "id";

/// Live records of one type with all their orderings.
pub struct Table<T: Object> {
    rows: BTreeMap<i64, T>,
    secondary: SecondaryIndices<T>,
    /// Serialized size of all live rows
    footprint: u64,
}

impl<T: Object> Table<T> {
    /// Create an empty table with `T`'s declared orderings
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            secondary: T::secondary_indices(),
            footprint: 0,
        }
    }

    /// Number of live rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no live rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialized byte size of all live rows
    pub fn footprint(&self) -> u64 {
        self.footprint
    }

    /// Row by id
    #[inline]
    pub fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    /// True if `id` is live
    #[inline]
    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    /// Rows in id order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.rows.values()
    }

    /// Typed access to a secondary ordering
    pub fn ordering<K: SecondaryKey<T>>(&self) -> Option<&UniqueIndex<T, K>> {
        self.secondary.get::<K>()
    }

    /// Ordering `obj` would collide in if it were stored under `own_id`
    pub fn conflict(&self, obj: &T, own_id: Option<i64>) -> Option<&'static str> {
        self.secondary.conflict(obj, own_id)
    }

    /// Ordering `obj` would collide in once every row `detached` accepts
    /// has been removed
    pub fn conflict_after_detach<F>(&self, obj: &T, detached: F) -> Option<&'static str>
    where
        F: Fn(i64) -> bool,
    {
        self.secondary.conflict_where(obj, |holder| !detached(holder))
    }

    /// Insert a new row under its own id.
    ///
    /// Fails with the colliding ordering's name; nothing is inserted.
    pub fn insert(&mut self, obj: T) -> Result<(), &'static str> {
        let id = obj.id().get();
        if self.rows.contains_key(&id) {
            return Err(PRIMARY_ORDERING);
        }
        if let Some(ordering) = self.secondary.conflict(&obj, None) {
            return Err(ordering);
        }
        self.secondary.insert(&obj, id);
        self.footprint += encoded_len(&obj);
        self.rows.insert(id, obj);
        Ok(())
    }

    /// Replace the row with the same id as `obj`, returning the old row.
    ///
    /// Returns `Ok(None)` if no such row exists. Fails with the colliding
    /// ordering's name; the old row stays in place.
    pub fn replace(&mut self, obj: T) -> Result<Option<T>, &'static str> {
        let id = obj.id().get();
        if !self.rows.contains_key(&id) {
            return Ok(None);
        }
        if let Some(ordering) = self.secondary.conflict(&obj, Some(id)) {
            return Err(ordering);
        }
        let new_len = encoded_len(&obj);
        let old = self.rows.insert(id, obj);
        if let Some(old) = &old {
            self.secondary.remove(old, id);
            self.footprint = self.footprint.saturating_sub(encoded_len(old));
        }
        if let Some(new) = self.rows.get(&id) {
            self.secondary.insert(new, id);
        }
        self.footprint += new_len;
        Ok(old)
    }

    /// Erase a row from every ordering
    pub fn remove(&mut self, id: i64) -> Option<T> {
        let old = self.rows.remove(&id)?;
        self.secondary.remove(&old, id);
        self.footprint = self.footprint.saturating_sub(encoded_len(&old));
        Some(old)
    }

    /// Drop every row
    pub fn clear(&mut self) {
        self.rows.clear();
        self.secondary.clear();
        self.footprint = 0;
    }
}

impl<T: Object> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn encoded_len<T: Object>(obj: &T) -> u64 {
    // Sizing an in-memory value cannot fail for serde-derived types; a
    // custom impl that errors only loses accounting precision.
    bincode::serialized_size(obj).unwrap_or(0)
}
