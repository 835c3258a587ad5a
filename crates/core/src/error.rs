//! Error types for the chainbase store.
//!
//! Every crate in the workspace reports failures through [`Error`]. Variants
//! fall into two classes:
//!
//! - **Recoverable**: per-operation failures the caller is expected to catch
//!   (a rejected transaction, a missing key, a busy lock).
//! - **Fatal**: the persisted state or the undo bookkeeping can no longer be
//!   trusted. The hosting process should stop and rebuild state.
//!
//! Use [`Error::is_fatal`] to tell them apart.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error raised by a caller-supplied mutator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All chainbase errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A secondary key collided with a live record
    #[error("uniqueness constraint violated in ordering `{ordering}` of {type_name}")]
    UniquenessViolation {
        /// Record type the collision happened in
        type_name: &'static str,
        /// Name of the colliding ordering
        ordering: &'static str,
    },

    /// Point lookup on an absent key
    #[error("unknown key ({key}) in index of {type_name}")]
    NotFound {
        /// Record type that was queried
        type_name: &'static str,
        /// Debug rendering of the key
        key: String,
    },

    /// A `try_modify` closure failed; the table was reindexed before this
    /// error was returned.
    #[error("modifier for {type_name} failed: {source}")]
    Mutator {
        /// Record type being modified
        type_name: &'static str,
        /// Error produced by the mutator
        #[source]
        source: BoxError,
    },

    /// Persisted layout disagrees with the running binary's layout
    #[error("structural mismatch for {type_name}: {reason}")]
    StructuralMismatch {
        /// Region or record type that failed the check
        type_name: String,
        /// What differed
        reason: String,
    },

    /// Undo bookkeeping references state that does not exist
    #[error("internal consistency violation in {type_name}: {reason}")]
    InternalConsistency {
        /// Record type whose index is inconsistent
        type_name: &'static str,
        /// What was expected
        reason: String,
    },

    /// A bounded read-lock request expired
    #[error("unable to acquire read lock within {timeout_ms}ms")]
    LockTimeout {
        /// The timeout that elapsed
        timeout_ms: u64,
    },

    /// Check-locking mode caught an operation without the required lock
    #[error("{operation} requires the {required} lock")]
    LockViolation {
        /// Operation that was attempted
        operation: &'static str,
        /// "read" or "write"
        required: &'static str,
    },

    /// A type id was registered twice
    #[error("type id {type_id} is already in use (registering {type_name})")]
    DoubleRegistration {
        /// Type id already taken
        type_id: u16,
        /// Type being registered
        type_name: &'static str,
    },

    /// Persisted schema presence disagrees with the running schema
    #[error("schema mismatch for {type_name}: {reason}; a full state rebuild is required")]
    SchemaMismatch {
        /// Type being registered
        type_name: &'static str,
        /// What disagreed
        reason: String,
    },

    /// Routing to a type that was never added
    #[error("no index registered for {type_name}")]
    UnregisteredType {
        /// Type that was requested
        type_name: &'static str,
    },

    /// Mutation attempted on a read-only database
    #[error("{operation} is not permitted on a read-only database")]
    ReadOnly {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// The segment was not closed cleanly
    #[error("database dirty flag set at {path:?}, likely due to unclean shutdown")]
    Dirty {
        /// Segment file path
        path: PathBuf,
    },

    /// The live state does not fit in the segment
    #[error("segment exhausted: need {needed} bytes, capacity is {capacity}")]
    SegmentExhausted {
        /// Bytes required
        needed: u64,
        /// Bytes available for data
        capacity: u64,
    },

    /// Segments only grow
    #[error("cannot resize segment to {requested} bytes, current size is {current}")]
    InvalidResize {
        /// Requested size
        requested: u64,
        /// Current size
        current: u64,
    },

    /// Another process holds the segment's file lock
    #[error("database at {path:?} is locked by another process")]
    AlreadyLocked {
        /// Segment file path
        path: PathBuf,
    },

    /// Revision manipulation illegal in the current state
    #[error("revision conflict: {0}")]
    RevisionConflict(String),

    /// Persisted bytes failed an integrity check
    #[error("corruption: {0}")]
    Corruption(String),

    /// Encoding or decoding a record failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for chainbase operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `NotFound` from any debuggable key.
    pub fn not_found(type_name: &'static str, key: impl std::fmt::Debug) -> Self {
        Error::NotFound {
            type_name,
            key: format!("{:?}", key),
        }
    }

    /// Build an `InternalConsistency` error.
    pub fn inconsistent(type_name: &'static str, reason: impl Into<String>) -> Self {
        Error::InternalConsistency {
            type_name,
            reason: reason.into(),
        }
    }

    /// Check if the hosting process should terminate on this error.
    ///
    /// Fatal errors mean persisted state or undo bookkeeping is not
    /// trustworthy; the only safe recovery is a state rebuild.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StructuralMismatch { .. }
                | Error::InternalConsistency { .. }
                | Error::DoubleRegistration { .. }
                | Error::SchemaMismatch { .. }
                | Error::Corruption(_)
        )
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this is a uniqueness violation.
    pub fn is_uniqueness_violation(&self) -> bool {
        matches!(self, Error::UniquenessViolation { .. })
    }

    /// Check if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
