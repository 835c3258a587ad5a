//! Convenient imports for chainbase.
//!
//! ```ignore
//! use chainbase::prelude::*;
//! ```

// Entry points
pub use crate::config::{AccessMode, DatabaseConfig, OpenOptions};
pub use crate::database::{Database, IndexHandle};
pub use crate::session::Session;
pub use crate::shared::SharedDatabase;

// Error handling
pub use chainbase_core::{Error, Result};

// Schema
pub use chainbase_core::{Object, Oid, SecondaryIndices, SecondaryKey};

// Sessions
pub use chainbase_index::UndoSession;
