//! Lock-protected database handle
//!
//! [`SharedDatabase`] is how threads share one [`Database`]. Queries run
//! under the read lock, mutations and session management under the write
//! lock. Wrap it in an `Arc` to hand it to other threads.

use crate::database::Database;
use chainbase_concurrency::{ReadGuard, StoreLock, WriteGuard};
use chainbase_core::Result;
use std::time::Duration;

/// A [`Database`] behind its global store lock.
pub struct SharedDatabase {
    lock: StoreLock<Database>,
}

impl SharedDatabase {
    /// Put `db` behind a lock sharing its check-locking counters
    pub fn new(db: Database) -> Self {
        let counters = db.lock_counters();
        let timeout = db.config().default_read_timeout();
        Self {
            lock: StoreLock::with_counters(db, counters).with_default_read_timeout(timeout),
        }
    }

    /// Run `f` with shared access.
    ///
    /// Without an explicit `timeout` the configured default read timeout
    /// applies; with neither this blocks until no writer holds the lock.
    pub fn with_read_lock<R, F>(&self, timeout: Option<Duration>, f: F) -> Result<R>
    where
        F: FnOnce(&Database) -> R,
    {
        self.lock.with_read_lock(timeout, f)
    }

    /// Run `f` with exclusive access
    pub fn with_write_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Database) -> R,
    {
        self.lock.with_write_lock(f)
    }

    /// Hold the read lock until the guard drops
    pub fn read(&self) -> ReadGuard<'_, Database> {
        self.lock.read()
    }

    /// Hold the read lock, giving up after `timeout`
    pub fn try_read_for(&self, timeout: Duration) -> Result<ReadGuard<'_, Database>> {
        self.lock.try_read_for(timeout)
    }

    /// Hold the write lock until the guard drops
    pub fn write(&self) -> WriteGuard<'_, Database> {
        self.lock.write()
    }

    /// Take the database back out of the lock
    pub fn into_inner(self) -> Database {
        self.lock.into_inner()
    }
}

impl std::fmt::Debug for SharedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDatabase").finish_non_exhaustive()
    }
}
