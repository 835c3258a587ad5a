//! Versioned indices for chainbase
//!
//! This crate implements the undo-capable record collection:
//! - [`Table`]: live records with a primary id ordering and unique secondary orderings
//! - [`VersionedIndex`]: a table plus its undo stack (undo / squash / commit)
//! - [`IndexSession`]: scope guard for one open checkpoint on one index
//! - [`AbstractIndex`]: type-erased versioning surface used by the database

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abstract_index;
pub mod index;
pub mod session;
pub mod table;
pub mod undo_state;


pub use abstract_index::AbstractIndex;
pub use index::VersionedIndex;
pub use session::{IndexSession, UndoSession};
pub use table::{Table, PRIMARY_ORDERING};
pub use undo_state::UndoState;
