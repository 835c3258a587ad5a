//! Segment payload
//!
//! The payload is a bincode-encoded list of [`Region`]s, one per index. A
//! region holds an index's live table only; undo stacks are never persisted.

use chainbase_core::{Error, LayoutDescriptor, Result};
use serde::{Deserialize, Serialize};

/// Persisted contents of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region name (the record type name)
    pub name: String,
    /// Layout the rows were written with
    pub layout: LayoutDescriptor,
    /// Index revision at flush time
    pub revision: i64,
    /// Id allocator position at flush time
    pub next_id: i64,
    /// Encoded live rows
    pub rows: Vec<u8>,
}

/// Encode the region list and compute its checksum
pub fn encode_payload(regions: &[Region]) -> Result<(Vec<u8>, u32)> {
    let bytes = bincode::serialize(regions)?;
    let crc = crc32fast::hash(&bytes);
    Ok((bytes, crc))
}

/// Verify the checksum and decode the region list
pub fn decode_payload(bytes: &[u8], expected_crc: u32) -> Result<Vec<Region>> {
    let actual = crc32fast::hash(bytes);
    if actual != expected_crc {
        return Err(Error::Corruption(format!(
            "segment payload checksum mismatch: expected {:#010x}, found {:#010x}",
            expected_crc, actual
        )));
    }
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(bincode::deserialize(bytes)?)
}
