//! Database-wide undo sessions
//!
//! [`Session`] opens one checkpoint on every registered index and disposes
//! them together, in registration order. It borrows the database mutably
//! and dereferences to it, so the session is the only way to reach the
//! database while it is open.
//!
//! ```ignore
//! let mut session = db.start_undo_session(true)?;
//! session.create::<Account, _>(|a| a.name = "alice".into())?;
//! {
//!     let mut inner = session.start_undo_session(true)?;
//!     inner.remove::<Account>(Oid::new(0))?;
//!     inner.undo()?;
//! }
//! session.push();
//! ```

use crate::database::Database;
use chainbase_core::Result;
use chainbase_index::UndoSession;
use std::ops::{Deref, DerefMut};
use tracing::{debug, error, warn};

/// An open checkpoint across every index of a [`Database`].
pub struct Session<'a> {
    db: &'a mut Database,
    apply: bool,
    revision: i64,
}

impl<'a> Session<'a> {
    pub(crate) fn new(db: &'a mut Database, revision: i64) -> Self {
        Self {
            db,
            apply: true,
            revision,
        }
    }

    pub(crate) fn disabled(db: &'a mut Database) -> Self {
        Self {
            db,
            apply: false,
            revision: -1,
        }
    }

    /// Revision this session opened, or -1 if disabled
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Keep the changes; the undo states stay on every index's stack
    pub fn push(mut self) {
        if self.apply {
            debug!(revision = self.revision, "pushed undo session");
        }
        self.apply = false;
    }

    /// Merge into the enclosing session
    pub fn squash(mut self) -> Result<()> {
        if !self.take() {
            return Ok(());
        }
        self.db.squash_indices()?;
        debug!(revision = self.revision, "squashed undo session");
        Ok(())
    }

    /// Roll back every index
    pub fn undo(mut self) -> Result<()> {
        if !self.take() {
            return Ok(());
        }
        self.db.undo_indices()?;
        debug!(revision = self.revision, "undid undo session");
        Ok(())
    }

    fn take(&mut self) -> bool {
        let owned = self.apply;
        self.apply = false;
        if owned && self.db.revision() != self.revision {
            warn!(
                session_revision = self.revision,
                database_revision = self.db.revision(),
                "session is no longer innermost; skipping disposal"
            );
            return false;
        }
        owned
    }
}

impl Deref for Session<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.db
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.take() {
            warn!(revision = self.revision, "undo session dropped undisposed; rolling back");
            if let Err(e) = self.db.undo_indices() {
                error!(revision = self.revision, error = %e, "undo on drop failed");
            }
        }
    }
}

impl UndoSession for Session<'_> {
    fn revision(&self) -> i64 {
        Session::revision(self)
    }

    fn push(self) {
        Session::push(self)
    }

    fn squash(self) -> Result<()> {
        Session::squash(self)
    }

    fn undo(self) -> Result<()> {
        Session::undo(self)
    }
}
