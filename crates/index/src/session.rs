//! Undo sessions
//!
//! A session is a capability for one open undo checkpoint. It is disposed
//! exactly once, by one of:
//!
//! | Method | Live changes | Undo state |
//! |--------|--------------|------------|
//! | `push()` | kept | left on the stack for a later `undo`/`squash`/`commit` |
//! | `squash()` | kept | merged into the enclosing session |
//! | `undo()` | reverted | popped |
//!
//! Dropping an undisposed session behaves as `undo()`.
//!
//! [`IndexSession`] borrows its index mutably and dereferences to it, so
//! mutations made during the session go through the guard and a nested
//! session can only be opened from (and must be disposed before) its parent.

use crate::index::VersionedIndex;
use chainbase_core::{Object, Result};
use std::ops::{Deref, DerefMut};
use tracing::{error, warn};

/// An open undo checkpoint.
///
/// Disposal methods consume the session; moving a session moves the
/// responsibility to dispose it.
pub trait UndoSession: Sized {
    /// Revision this session opened, or -1 if it is disabled
    fn revision(&self) -> i64;

    /// Keep the changes and stop owning the undo state
    fn push(self);

    /// Merge into the enclosing session
    fn squash(self) -> Result<()>;

    /// Roll back
    fn undo(self) -> Result<()>;
}

/// Session guard over a single [`VersionedIndex`].
pub struct IndexSession<'a, T: Object> {
    index: &'a mut VersionedIndex<T>,
    apply: bool,
    revision: i64,
}

impl<'a, T: Object> IndexSession<'a, T> {
    pub(crate) fn new(index: &'a mut VersionedIndex<T>, revision: i64) -> Self {
        Self {
            index,
            apply: true,
            revision,
        }
    }

    pub(crate) fn disabled(index: &'a mut VersionedIndex<T>) -> Self {
        Self {
            index,
            apply: false,
            revision: -1,
        }
    }

    /// Revision this session opened, or -1 if disabled
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Keep the changes; the undo state stays on the index's stack
    pub fn push(mut self) {
        self.apply = false;
    }

    /// Merge this session into the enclosing one
    pub fn squash(mut self) -> Result<()> {
        if !self.take() {
            return Ok(());
        }
        self.index.squash()
    }

    /// Roll this session back
    pub fn undo(mut self) -> Result<()> {
        if !self.take() {
            return Ok(());
        }
        self.index.undo()
    }

    /// Clear `apply`, reporting whether this session still owns the
    /// innermost undo state.
    fn take(&mut self) -> bool {
        let owned = self.apply;
        self.apply = false;
        if owned && self.index.revision() != self.revision {
            warn!(
                type_name = T::TYPE_NAME,
                session_revision = self.revision,
                index_revision = self.index.revision(),
                "session is no longer innermost; skipping disposal"
            );
            return false;
        }
        owned
    }
}

impl<T: Object> Deref for IndexSession<'_, T> {
    type Target = VersionedIndex<T>;

    fn deref(&self) -> &Self::Target {
        self.index
    }
}

impl<T: Object> DerefMut for IndexSession<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.index
    }
}

impl<T: Object> Drop for IndexSession<'_, T> {
    fn drop(&mut self) {
        if self.take() {
            if let Err(e) = self.index.undo() {
                error!(type_name = T::TYPE_NAME, error = %e, "undo on drop failed");
            }
        }
    }
}

impl<T: Object> UndoSession for IndexSession<'_, T> {
    fn revision(&self) -> i64 {
        IndexSession::revision(self)
    }

    fn push(self) {
        IndexSession::push(self)
    }

    fn squash(self) -> Result<()> {
        IndexSession::squash(self)
    }

    fn undo(self) -> Result<()> {
        IndexSession::undo(self)
    }
}
