//! Database configuration
//!
//! [`DatabaseConfig`] holds the tunables that do not change how the segment
//! is opened; it can be loaded from TOML:
//!
//! ```toml
//! check_locking = true
//! default_read_timeout_ms = 250
//! ```
//!
//! [`OpenOptions`] combines a config with the open-time parameters (path,
//! segment size, access mode).

use crate::database::Database;
use crate::shared::SharedDatabase;
use chainbase_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use chainbase_storage::AccessMode;

/// Segment size used when none is given: 8 MiB.
pub const DEFAULT_SEGMENT_SIZE: u64 = 8 * 1024 * 1024;

/// Runtime tunables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Verify that every operation runs under the lock it needs
    pub check_locking: bool,
    /// Bound for read-lock requests that do not pass their own timeout
    pub default_read_timeout_ms: Option<u64>,
}

impl DatabaseConfig {
    /// Parse from a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Serialization(format!("invalid config: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Default read timeout as a duration
    pub fn default_read_timeout(&self) -> Option<Duration> {
        self.default_read_timeout_ms.map(Duration::from_millis)
    }
}

/// Builder for opening a [`Database`].
///
/// ```ignore
/// let db = OpenOptions::new("./state")
///     .size(64 * 1024 * 1024)
///     .check_locking(true)
///     .open_shared()?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    path: PathBuf,
    size: u64,
    access_mode: AccessMode,
    config: DatabaseConfig,
}

impl OpenOptions {
    /// Options for the database directory `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            size: DEFAULT_SEGMENT_SIZE,
            access_mode: AccessMode::ReadWrite,
            config: DatabaseConfig::default(),
        }
    }

    /// Replace the directory
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Minimum segment size in bytes
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Open for queries only
    pub fn read_only(mut self) -> Self {
        self.access_mode = AccessMode::ReadOnly;
        self
    }

    /// Set the access mode
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = mode;
        self
    }

    /// Replace the whole config
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Toggle check-locking
    pub fn check_locking(mut self, enabled: bool) -> Self {
        self.config.check_locking = enabled;
        self
    }

    /// Open the database
    pub fn open(self) -> Result<Database> {
        Database::open(self.path, self.access_mode, self.size, self.config)
    }

    /// Open the database behind its store lock
    pub fn open_shared(self) -> Result<SharedDatabase> {
        Ok(SharedDatabase::new(self.open()?))
    }
}
