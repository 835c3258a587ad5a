//! Segment storage for chainbase
//!
//! This crate implements the persistent backing of a database directory:
//! - [`Segment`]: memory-mapped file holding every index's live table
//! - [`format`]: header and payload byte formats
//! - [`LockedFile`]: advisory process lock on the segment file

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file_lock;
pub mod format;
pub mod segment;

pub use file_lock::LockedFile;
pub use format::{Region, SegmentHeader, HEADER_SIZE};
pub use segment::{AccessMode, Segment, SEGMENT_FILE_NAME};
