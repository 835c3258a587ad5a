//! Concurrency layer for chainbase
//!
//! The store has no threads of its own. Callers share it through a
//! [`StoreLock`]: one global reader/writer lock per database, with bounded
//! read acquisition and optional check-locking counters.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counters;
pub mod lock;

pub use counters::LockCounters;
pub use lock::{ReadGuard, StoreLock, WriteGuard};
