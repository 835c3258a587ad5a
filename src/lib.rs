//! # Chainbase
//!
//! Versioned, undo-capable object store for blockchain state.
//!
//! A [`Database`] holds one index per registered record type. Every index
//! keeps its records in a primary id ordering plus any number of unique
//! secondary orderings, and records enough undo information per open
//! session to roll a block (or a transaction within it) back exactly.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chainbase::prelude::*;
//!
//! let db = OpenOptions::new("./state").size(64 << 20).open_shared()?;
//! db.with_write_lock(|db| -> Result<()> {
//!     db.add_index::<Account>()?;
//!     let session = db.start_undo_session(true)?;
//!     // apply the block through `session`
//!     session.push();
//!     Ok(())
//! })?;
//! ```
//!
//! ## Sessions
//!
//! | Disposal | Live changes | Undo state |
//! |----------|--------------|------------|
//! | `push()` | kept | stays on the stack until `undo`/`squash`/`commit` |
//! | `squash()` | kept | merged into the enclosing session |
//! | `undo()` / drop | reverted | discarded |
//!
//! `commit(revision)` makes everything up to `revision` irreversible.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod database;
mod session;
mod shared;

pub mod prelude;

pub use config::{AccessMode, DatabaseConfig, OpenOptions, DEFAULT_SEGMENT_SIZE};
pub use database::{Database, IndexHandle};
pub use session::Session;
pub use shared::SharedDatabase;

pub use chainbase_core::{
    BoxError, Error, LayoutDescriptor, Object, Oid, Result, SecondaryIndices, SecondaryKey,
};
pub use chainbase_index::{AbstractIndex, IndexSession, UndoSession, UndoState, VersionedIndex};
pub use chainbase_storage::SEGMENT_FILE_NAME;
