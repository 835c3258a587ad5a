//! Global store lock
//!
//! ## Semantics
//!
//! | Acquisition | Blocks while | Bounded |
//! |-------------|--------------|---------|
//! | read | a writer holds the lock | optional timeout, `LockTimeout` on expiry |
//! | write | any reader or writer holds the lock | never |
//!
//! Reads use the recursive read path, so a waiting writer does not hold back
//! new readers and a thread may nest read guards.

use crate::counters::LockCounters;
use chainbase_core::{Error, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Reader/writer lock around a store.
pub struct StoreLock<T> {
    inner: RwLock<T>,
    counters: Arc<LockCounters>,
    default_read_timeout: Option<Duration>,
}

impl<T> StoreLock<T> {
    /// Wrap `value` with fresh counters and no default read timeout
    pub fn new(value: T) -> Self {
        Self::with_counters(value, Arc::new(LockCounters::new()))
    }

    /// Wrap `value`, reporting held guards to `counters`
    pub fn with_counters(value: T, counters: Arc<LockCounters>) -> Self {
        Self {
            inner: RwLock::new(value),
            counters,
            default_read_timeout: None,
        }
    }

    /// Timeout applied by [`with_read_lock`](Self::with_read_lock) when the
    /// caller passes none
    pub fn with_default_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_read_timeout = timeout;
        self
    }

    /// Shared counters
    pub fn counters(&self) -> &Arc<LockCounters> {
        &self.counters
    }

    /// Acquire a read guard, blocking while a writer holds the lock
    pub fn read(&self) -> ReadGuard<'_, T> {
        let guard = self.inner.read_recursive();
        ReadGuard::new(guard, &self.counters)
    }

    /// Acquire a read guard, giving up after `timeout`
    pub fn try_read_for(&self, timeout: Duration) -> Result<ReadGuard<'_, T>> {
        match self.inner.try_read_recursive_for(timeout) {
            Some(guard) => Ok(ReadGuard::new(guard, &self.counters)),
            None => {
                let timeout_ms = timeout.as_millis() as u64;
                debug!(timeout_ms, "read lock timed out");
                Err(Error::LockTimeout { timeout_ms })
            }
        }
    }

    /// Acquire the write guard, blocking until no other guard is held
    pub fn write(&self) -> WriteGuard<'_, T> {
        let guard = self.inner.write();
        WriteGuard::new(guard, &self.counters)
    }

    /// Run `f` under a read guard.
    ///
    /// `timeout` falls back to the default read timeout; with neither the
    /// call blocks until the lock is available.
    pub fn with_read_lock<R, F>(&self, timeout: Option<Duration>, f: F) -> Result<R>
    where
        F: FnOnce(&T) -> R,
    {
        let guard = match timeout.or(self.default_read_timeout) {
            Some(timeout) => self.try_read_for(timeout)?,
            None => self.read(),
        };
        Ok(f(&guard))
    }

    /// Run `f` under the write guard
    pub fn with_write_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.write();
        f(&mut guard)
    }

    /// Unwrap the protected value
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Shared access to the protected value.
pub struct ReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    counters: &'a LockCounters,
}

impl<'a, T> ReadGuard<'a, T> {
    fn new(guard: RwLockReadGuard<'a, T>, counters: &'a LockCounters) -> Self {
        counters.enter_read();
        Self { guard, counters }
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.counters.exit_read();
    }
}

/// Exclusive access to the protected value.
pub struct WriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    counters: &'a LockCounters,
}

impl<'a, T> WriteGuard<'a, T> {
    fn new(guard: RwLockWriteGuard<'a, T>, counters: &'a LockCounters) -> Self {
        counters.enter_write();
        Self { guard, counters }
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.counters.exit_write();
    }
}
