//! On-disk byte formats for the segment file.
//!
//! # Module Structure
//!
//! - `header`: fixed-size segment header (magic, environment, dirty flag, checksum)
//! - `region`: per-index payload regions

pub mod header;
pub mod region;

pub use header::{SegmentHeader, HEADER_SIZE, SEGMENT_FORMAT_VERSION, SEGMENT_MAGIC};
pub use region::{decode_payload, encode_payload, Region};
