//! Segment header
//!
//! The first [`HEADER_SIZE`] bytes of the segment file. All integers are
//! little-endian.
//!
//! ```text
//! offset  size  field
//! 0       8     magic
//! 8       4     format version
//! 12      1     dirty flag
//! 13      1     writer word size (bytes)
//! 14      1     writer endianness (1 = little)
//! 15      1     reserved
//! 16      8     payload length
//! 24      4     payload CRC32
//! 28      4     reserved
//! 32      8     last flush (unix seconds)
//! 40      216   zero
//! ```

use byteorder::{ByteOrder, LittleEndian};
use chainbase_core::{Error, Result};

/// Total header size in bytes; the payload starts here.
pub const HEADER_SIZE: usize = 256;

/// "CHAINBSE"
pub const SEGMENT_MAGIC: u64 = 0x4553_424e_4941_4843;

/// Current header format version
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

const WORD_SIZE: u8 = std::mem::size_of::<usize>() as u8;
const LITTLE_ENDIAN: bool = cfg!(target_endian = "little");

/// Decoded segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Header format version
    pub format_version: u32,
    /// Set while a read-write process has the segment open
    pub dirty: bool,
    /// `size_of::<usize>()` of the writing binary
    pub word_size: u8,
    /// Endianness of the writing binary
    pub little_endian: bool,
    /// Length of the payload following the header
    pub payload_len: u64,
    /// CRC32 of the payload
    pub payload_crc: u32,
    /// Wall-clock time of the last flush, unix seconds
    pub last_flush: i64,
}

impl SegmentHeader {
    /// Header for an empty segment written by this binary
    pub fn new() -> Self {
        Self {
            format_version: SEGMENT_FORMAT_VERSION,
            dirty: false,
            word_size: WORD_SIZE,
            little_endian: LITTLE_ENDIAN,
            payload_len: 0,
            payload_crc: crc32fast::hash(&[]),
            last_flush: 0,
        }
    }

    /// Serialize to exactly [`HEADER_SIZE`] bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        LittleEndian::write_u64(&mut buf[0..8], SEGMENT_MAGIC);
        LittleEndian::write_u32(&mut buf[8..12], self.format_version);
        buf[12] = self.dirty as u8;
        buf[13] = self.word_size;
        buf[14] = self.little_endian as u8;
        LittleEndian::write_u64(&mut buf[16..24], self.payload_len);
        LittleEndian::write_u32(&mut buf[24..28], self.payload_crc);
        LittleEndian::write_i64(&mut buf[32..40], self.last_flush);
        buf
    }

    /// Parse a header, checking only the magic.
    ///
    /// Use [`check_compatible`](Self::check_compatible) before trusting the
    /// payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Corruption(format!(
                "segment header truncated: {} bytes",
                bytes.len()
            )));
        }
        let magic = LittleEndian::read_u64(&bytes[0..8]);
        if magic != SEGMENT_MAGIC {
            return Err(Error::Corruption(format!(
                "bad segment magic {:#018x}",
                magic
            )));
        }
        Ok(Self {
            format_version: LittleEndian::read_u32(&bytes[8..12]),
            dirty: bytes[12] != 0,
            word_size: bytes[13],
            little_endian: bytes[14] != 0,
            payload_len: LittleEndian::read_u64(&bytes[16..24]),
            payload_crc: LittleEndian::read_u32(&bytes[24..28]),
            last_flush: LittleEndian::read_i64(&bytes[32..40]),
        })
    }

    /// Reject segments written by an incompatible binary
    pub fn check_compatible(&self) -> Result<()> {
        let reason = if self.format_version != SEGMENT_FORMAT_VERSION {
            format!(
                "segment format version {} (expected {})",
                self.format_version, SEGMENT_FORMAT_VERSION
            )
        } else if self.word_size != WORD_SIZE {
            format!(
                "segment written with {}-byte words (this binary uses {})",
                self.word_size, WORD_SIZE
            )
        } else if self.little_endian != LITTLE_ENDIAN {
            "segment written with a different byte order".to_string()
        } else {
            return Ok(());
        };
        Err(Error::StructuralMismatch {
            type_name: "segment".to_string(),
            reason,
        })
    }
}

impl Default for SegmentHeader {
    fn default() -> Self {
        Self::new()
    }
}
