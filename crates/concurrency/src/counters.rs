//! Check-locking counters
//!
//! [`LockCounters`] tracks how many read and write guards of a
//! [`StoreLock`](crate::StoreLock) are currently held. A database with
//! check-locking enabled consults them before every operation.

use chainbase_core::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Held-guard counts for one lock.
#[derive(Debug, Default)]
pub struct LockCounters {
    readers: AtomicUsize,
    writers: AtomicUsize,
}

impl LockCounters {
    /// Counters with nothing held
    pub fn new() -> Self {
        Self::default()
    }

    /// Read guards currently held
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    /// Write guards currently held (0 or 1)
    pub fn writers(&self) -> usize {
        self.writers.load(Ordering::Acquire)
    }

    /// Fail unless a read or write guard is held
    pub fn require_read(&self, operation: &'static str) -> Result<()> {
        if self.readers() == 0 && self.writers() == 0 {
            return Err(Error::LockViolation {
                operation,
                required: "read",
            });
        }
        Ok(())
    }

    /// Fail unless the write guard is held
    pub fn require_write(&self, operation: &'static str) -> Result<()> {
        if self.writers() == 0 {
            return Err(Error::LockViolation {
                operation,
                required: "write",
            });
        }
        Ok(())
    }

    pub(crate) fn enter_read(&self) {
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn exit_read(&self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn enter_write(&self) {
        self.writers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn exit_write(&self) {
        self.writers.fetch_sub(1, Ordering::AcqRel);
    }
}
