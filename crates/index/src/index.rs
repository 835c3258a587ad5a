//! Versioned index
//!
//! [`VersionedIndex`] is the collection of records of one type together with
//! its undo stack. Mutations are visible immediately; each open session keeps
//! just enough information ([`UndoState`]) to revert them.
//!
//! ## Undo Stack
//!
//! ```text
//! oldest                                        innermost
//! [ UndoState r=5 ] [ UndoState r=6 ] [ UndoState r=7 ]   revision = 7
//!        ^ commit(r) pops from here        undo/squash pop here ^
//! ```
//!
//! - `start_undo_session` pushes a fresh state and increments the revision.
//! - `undo` reverts the innermost state; `squash` merges it into the next
//!   one. Both decrement the revision.
//! - `commit(r)` discards states with revision <= r without touching live
//!   contents.

use crate::session::IndexSession;
use crate::table::{Table, PRIMARY_ORDERING};
use crate::undo_state::UndoState;
use chainbase_core::{
    BoxError, Error, LayoutDescriptor, Object, Oid, Result, SecondaryKey,
};
use std::collections::VecDeque;
use std::ops::RangeBounds;
use tracing::{debug, error};

/// Records of one type plus their undo stack.
pub struct VersionedIndex<T: Object> {
    table: Table<T>,
    undo_stack: VecDeque<UndoState<T>>,
    next_id: i64,
    revision: i64,
    /// Layout recorded when this index was first created in the segment
    layout: LayoutDescriptor,
}

impl<T: Object> VersionedIndex<T> {
    /// Create an empty index with the compiled layout
    pub fn new() -> Self {
        Self {
            table: Table::new(),
            undo_stack: VecDeque::new(),
            next_id: 0,
            revision: 0,
            layout: LayoutDescriptor::of::<T>(),
        }
    }

    /// Rebuild an index from persisted parts.
    ///
    /// The layout is stored as given; call [`validate`](Self::validate) to
    /// compare it with the compiled one. Duplicate ids or keys and ids at or
    /// beyond `next_id` are reported as corruption.
    pub fn from_persisted(
        layout: LayoutDescriptor,
        revision: i64,
        next_id: i64,
        rows: Vec<T>,
    ) -> Result<Self> {
        let mut table = Table::new();
        for row in rows {
            let id = row.id().get();
            if id >= next_id {
                return Err(Error::Corruption(format!(
                    "{} row {} is not below next id {}",
                    T::TYPE_NAME,
                    id,
                    next_id
                )));
            }
            table.insert(row).map_err(|ordering| {
                Error::Corruption(format!(
                    "{} row {} collides in ordering `{}`",
                    T::TYPE_NAME,
                    id,
                    ordering
                ))
            })?;
        }
        Ok(Self {
            table,
            undo_stack: VecDeque::new(),
            next_id,
            revision,
            layout,
        })
    }

    /// Compare the stored layout with the compiled layout.
    ///
    /// A mismatch means the persisted rows were written by an incompatible
    /// schema; the store must not be used.
    pub fn validate(&self) -> Result<()> {
        self.layout.check(&LayoutDescriptor::of::<T>()).map_err(|e| {
            error!(type_name = T::TYPE_NAME, error = %e, "layout validation failed");
            e
        })
    }

    /// Layout recorded for this index
    pub fn layout(&self) -> &LayoutDescriptor {
        &self.layout
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a record with the next id.
    ///
    /// `init` receives a default-valued record; its id is assigned after
    /// `init` returns. On a key collision nothing is created and the id
    /// allocator does not advance.
    pub fn emplace<F>(&mut self, init: F) -> Result<&T>
    where
        F: FnOnce(&mut T),
    {
        let id = self.next_id;
        let mut obj = T::default();
        init(&mut obj);
        obj.set_id(Oid::new(id));

        self.table.insert(obj).map_err(|ordering| Error::UniquenessViolation {
            type_name: T::TYPE_NAME,
            ordering,
        })?;
        self.next_id += 1;
        self.on_create(id);

        self.table
            .get(id)
            .ok_or_else(|| Error::inconsistent(T::TYPE_NAME, format!("row {} vanished after insert", id)))
    }

    /// Apply `mutator` to the record `id`.
    pub fn modify<F>(&mut self, id: Oid<T>, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        self.try_modify(id, |obj| {
            mutator(obj);
            Ok::<(), BoxError>(())
        })
    }

    /// Apply a fallible `mutator` to the record `id`.
    ///
    /// The mutator runs on a copy. A key collision in the result is reported
    /// as `UniquenessViolation` and leaves the record untouched. Otherwise the
    /// result is reindexed and stored, and only then is a mutator error
    /// returned as `Error::Mutator`. The id field cannot be changed.
    pub fn try_modify<F, E>(&mut self, id: Oid<T>, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut T) -> std::result::Result<(), E>,
        E: Into<BoxError>,
    {
        let raw = id.get();
        let before = self
            .table
            .get(raw)
            .cloned()
            .ok_or_else(|| Error::not_found(T::TYPE_NAME, id))?;

        let mut updated = before.clone();
        let outcome = mutator(&mut updated);
        updated.set_id(id);

        if let Some(ordering) = self.table.conflict(&updated, Some(raw)) {
            return Err(Error::UniquenessViolation {
                type_name: T::TYPE_NAME,
                ordering,
            });
        }

        self.on_modify(raw, before);
        self.table
            .replace(updated)
            .map_err(|ordering| Error::UniquenessViolation {
                type_name: T::TYPE_NAME,
                ordering,
            })?;

        outcome.map_err(|e| Error::Mutator {
            type_name: T::TYPE_NAME,
            source: e.into(),
        })
    }

    /// Remove the record `id`, returning it.
    pub fn remove(&mut self, id: Oid<T>) -> Result<T> {
        let removed = self
            .table
            .remove(id.get())
            .ok_or_else(|| Error::not_found(T::TYPE_NAME, id))?;
        self.on_remove(&removed);
        Ok(removed)
    }

    fn on_create(&mut self, id: i64) {
        if let Some(state) = self.undo_stack.back_mut() {
            state.new_ids.insert(id);
        }
    }

    fn on_modify(&mut self, id: i64, before: T) {
        if let Some(state) = self.undo_stack.back_mut() {
            if !state.new_ids.contains(&id) && !state.old_values.contains_key(&id) {
                state.old_values.insert(id, before);
            }
        }
    }

    fn on_remove(&mut self, removed: &T) {
        let id = removed.id().get();
        if let Some(state) = self.undo_stack.back_mut() {
            if state.new_ids.remove(&id) {
                // Never existed before this session
                return;
            }
            if let Some(before) = state.old_values.remove(&id) {
                state.removed_values.insert(id, before);
            } else if !state.removed_values.contains_key(&id) {
                state.removed_values.insert(id, removed.clone());
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Record by id
    pub fn find(&self, id: Oid<T>) -> Option<&T> {
        self.table.get(id.get())
    }

    /// Record by id, or `NotFound`
    pub fn get(&self, id: Oid<T>) -> Result<&T> {
        self.find(id)
            .ok_or_else(|| Error::not_found(T::TYPE_NAME, id))
    }

    /// Record by secondary key
    pub fn find_by<K: SecondaryKey<T>>(&self, key: &K::Key) -> Option<&T> {
        let id = self.table.ordering::<K>()?.get(key)?;
        self.table.get(id)
    }

    /// Record by secondary key, or `NotFound`
    pub fn get_by<K: SecondaryKey<T>>(&self, key: &K::Key) -> Result<&T> {
        self.find_by::<K>(key)
            .ok_or_else(|| Error::not_found(T::TYPE_NAME, key))
    }

    /// Records in id order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.table.iter()
    }

    /// Records in `K` order
    pub fn iter_by<K: SecondaryKey<T>>(&self) -> impl Iterator<Item = &T> + '_ {
        self.range_by::<K, _>(..)
    }

    /// Records whose `K` key falls in `range`, in key order
    pub fn range_by<'a, K, R>(&'a self, range: R) -> impl Iterator<Item = &'a T> + 'a
    where
        K: SecondaryKey<T>,
        R: RangeBounds<K::Key> + 'a,
    {
        self.table
            .ordering::<K>()
            .map(|ordering| ordering.range(range))
            .into_iter()
            .flatten()
            .filter_map(move |(_, id)| self.table.get(id))
    }

    /// First record whose `K` key is >= `key`
    pub fn lower_bound<K: SecondaryKey<T>>(&self, key: &K::Key) -> Option<&T> {
        self.range_by::<K, _>(key.clone()..).next()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if there are no live records
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Serialized byte size of the live table
    pub fn footprint(&self) -> u64 {
        self.table.footprint()
    }

    /// Id the next `emplace` will allocate
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    // ========================================================================
    // Versioning
    // ========================================================================

    /// Current revision
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Set the revision; only legal with no open session
    pub fn set_revision(&mut self, revision: i64) -> Result<()> {
        if !self.undo_stack.is_empty() {
            return Err(Error::RevisionConflict(format!(
                "cannot set revision of {} while {} sessions are open",
                T::TYPE_NAME,
                self.undo_stack.len()
            )));
        }
        self.revision = revision;
        Ok(())
    }

    /// Revisions still reachable by `undo`: (oldest base, current)
    pub fn undo_stack_revision_range(&self) -> (i64, i64) {
        match (self.undo_stack.front(), self.undo_stack.back()) {
            (Some(front), Some(back)) => (front.revision - 1, back.revision),
            _ => (self.revision, self.revision),
        }
    }

    /// True if at least one session is open
    pub fn has_undo_session(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Number of open sessions
    pub fn undo_stack_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Innermost undo state
    pub fn last_undo_state(&self) -> Option<&UndoState<T>> {
        self.undo_stack.back()
    }

    /// Open a session guard; a disabled session records nothing
    pub fn start_undo_session(&mut self, enabled: bool) -> IndexSession<'_, T> {
        if enabled {
            let revision = self.begin_undo_session();
            IndexSession::new(self, revision)
        } else {
            IndexSession::disabled(self)
        }
    }

    /// Push a fresh undo state and return its revision.
    ///
    /// The caller owns the disposition: it must eventually `undo`, `squash`
    /// or `commit` past the returned revision.
    pub fn begin_undo_session(&mut self) -> i64 {
        self.revision += 1;
        self.undo_stack
            .push_back(UndoState::new(self.next_id, self.revision));
        self.revision
    }

    /// Revert the innermost session; no-op if none is open.
    pub fn undo(&mut self) -> Result<()> {
        let Some(state) = self.undo_stack.back() else {
            return Ok(());
        };

        if let Some(missing) = state.new_ids.iter().find(|id| !self.table.contains(**id)) {
            let err = Error::inconsistent(
                T::TYPE_NAME,
                format!("created id {} missing during undo", missing),
            );
            error!(type_name = T::TYPE_NAME, error = %err, "undo failed");
            return Err(err);
        }

        if let Err(err) = self.check_restorable(state) {
            error!(type_name = T::TYPE_NAME, error = %err, "undo failed");
            return Err(err);
        }

        let Some(state) = self.undo_stack.pop_back() else {
            return Ok(());
        };
        self.revision -= 1;

        // Detach every row this session modified or created first, so that a
        // before-image can reclaim a key the session handed to another row.
        for id in state.old_values.keys().chain(state.new_ids.iter()) {
            self.table.remove(*id);
        }
        for (_, before) in state.old_values {
            self.restore(before)?;
        }
        self.next_id = state.old_next_id;
        for (_, before) in state.removed_values {
            self.restore(before)?;
        }

        debug!(type_name = T::TYPE_NAME, revision = self.revision, "undo");
        Ok(())
    }

    /// Check that every before-image in `state` can be reinserted once the
    /// rows it replaces are detached. Runs before anything is changed.
    fn check_restorable(&self, state: &UndoState<T>) -> Result<()> {
        let detached = |id: i64| state.old_values.contains_key(&id) || state.new_ids.contains(&id);
        let violation = |ordering| Error::UniquenessViolation {
            type_name: T::TYPE_NAME,
            ordering,
        };

        // Before-images must not collide with surviving rows or each other
        let mut incoming = T::secondary_indices();
        for before in state.old_values.values().chain(state.removed_values.values()) {
            let id = before.id().get();
            if !detached(id) && self.table.contains(id) {
                return Err(violation(PRIMARY_ORDERING));
            }
            if let Some(ordering) = self.table.conflict_after_detach(before, detached) {
                return Err(violation(ordering));
            }
            if let Some(ordering) = incoming.conflict(before, None) {
                return Err(violation(ordering));
            }
            incoming.insert(before, id);
        }
        Ok(())
    }

    fn restore(&mut self, before: T) -> Result<()> {
        let id = before.id().get();
        self.table.insert(before).map_err(|ordering| {
            Error::inconsistent(
                T::TYPE_NAME,
                format!("row {} collided in `{}` after the restore check", id, ordering),
            )
        })
    }

    /// Merge the innermost session into the next one.
    ///
    /// With one session open this discards its undo information and keeps
    /// the live changes. No-op with none open.
    pub fn squash(&mut self) -> Result<()> {
        match self.undo_stack.len() {
            0 => return Ok(()),
            1 => {
                self.undo_stack.pop_back();
                self.revision -= 1;
                return Ok(());
            }
            _ => {}
        }

        let len = self.undo_stack.len();
        {
            let inner = &self.undo_stack[len - 1];
            let outer = &self.undo_stack[len - 2];
            let clash = inner
                .old_values
                .keys()
                .chain(inner.removed_values.keys())
                .find(|id| outer.removed_values.contains_key(*id));
            if let Some(id) = clash {
                let err = Error::inconsistent(
                    T::TYPE_NAME,
                    format!("id {} already removed by the enclosing session", id),
                );
                error!(type_name = T::TYPE_NAME, error = %err, "squash failed");
                return Err(err);
            }
        }

        let Some(inner) = self.undo_stack.pop_back() else {
            return Ok(());
        };
        let Some(outer) = self.undo_stack.back_mut() else {
            return Ok(());
        };

        for (id, before) in inner.old_values {
            if outer.new_ids.contains(&id) || outer.old_values.contains_key(&id) {
                continue;
            }
            outer.old_values.insert(id, before);
        }

        outer.new_ids.extend(inner.new_ids);

        for (id, before) in inner.removed_values {
            if outer.new_ids.remove(&id) {
                continue;
            }
            if let Some(original) = outer.old_values.remove(&id) {
                outer.removed_values.insert(id, original);
                continue;
            }
            outer.removed_values.insert(id, before);
        }

        self.revision -= 1;
        debug!(type_name = T::TYPE_NAME, revision = self.revision, "squash");
        Ok(())
    }

    /// Discard undo states with revision <= `revision`.
    pub fn commit(&mut self, revision: i64) {
        while self
            .undo_stack
            .front()
            .map_or(false, |state| state.revision <= revision)
        {
            self.undo_stack.pop_front();
        }
    }

    /// Undo until no session remains
    pub fn undo_all(&mut self) -> Result<()> {
        while !self.undo_stack.is_empty() {
            self.undo()?;
        }
        Ok(())
    }
}

impl<T: Object> Default for VersionedIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Object> std::fmt::Debug for VersionedIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedIndex")
            .field("type_name", &T::TYPE_NAME)
            .field("len", &self.len())
            .field("next_id", &self.next_id)
            .field("revision", &self.revision)
            .field("undo_stack_len", &self.undo_stack.len())
            .finish()
    }
}
