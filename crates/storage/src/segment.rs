//! Memory-mapped segment
//!
//! The segment is the single backing file of a database directory. It is
//! mapped into memory for its whole lifetime and holds every index's live
//! table between process runs.
//!
//! ## Lifecycle
//!
//! | Step | Read-write | Read-only |
//! |------|------------|-----------|
//! | open | create/grow file, lock exclusive, refuse dirty, set dirty | lock shared, refuse dirty |
//! | flush | write regions + header, msync | n/a |
//! | mark_clean | clear dirty, msync | n/a |
//!
//! Capacity is only enforced when regions are written: live tables are kept
//! in process memory and flushed into the mapping as a whole.

use crate::file_lock::LockedFile;
use crate::format::{decode_payload, encode_payload, Region, SegmentHeader, HEADER_SIZE};
use chainbase_core::{Error, Result};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the segment inside a database directory.
pub const SEGMENT_FILE_NAME: &str = "shared_memory.bin";

/// How a segment (and the database on top of it) is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Full access; takes the exclusive file lock
    #[default]
    ReadWrite,
    /// Queries only; takes a shared file lock and never writes the file
    ReadOnly,
}

impl AccessMode {
    /// True for [`AccessMode::ReadOnly`]
    pub fn is_read_only(&self) -> bool {
        matches!(self, AccessMode::ReadOnly)
    }
}

enum Mapping {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::Writable(m) => &m[..],
            Mapping::ReadOnly(m) => &m[..],
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Mapping::Writable(m) => m.flush(),
            Mapping::ReadOnly(_) => Ok(()),
        }
    }
}

/// An open segment file.
pub struct Segment {
    path: PathBuf,
    file: LockedFile,
    map: Mapping,
    mode: AccessMode,
    header: SegmentHeader,
    regions: Vec<Region>,
}

impl Segment {
    /// Open (or, read-write, create) the segment in `dir`.
    ///
    /// A read-write open of a file smaller than `size` grows it; a larger
    /// file keeps its size. A read-only open ignores `size`.
    pub fn open(dir: impl AsRef<Path>, size: u64, mode: AccessMode) -> Result<Self> {
        let dir = dir.as_ref();
        let path = dir.join(SEGMENT_FILE_NAME);

        if !mode.is_read_only() && size < HEADER_SIZE as u64 {
            return Err(Error::InvalidResize {
                requested: size,
                current: HEADER_SIZE as u64,
            });
        }

        let file = match mode {
            AccessMode::ReadWrite => {
                fs::create_dir_all(dir)?;
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)?
            }
            AccessMode::ReadOnly => OpenOptions::new().read(true).open(&path)?,
        };
        let file = LockedFile::acquire(file, &path, !mode.is_read_only())?;

        let existing = file.file().metadata()?.len();
        let fresh = existing == 0;
        if !mode.is_read_only() {
            if existing < size {
                file.file().set_len(size)?;
                if !fresh {
                    info!(path = ?path, from = existing, to = size, "grew segment");
                }
            } else if existing > size {
                warn!(
                    path = ?path,
                    requested = size,
                    actual = existing,
                    "segment is larger than requested; keeping existing size"
                );
            }
        }

        let map = match mode {
            // SAFETY: the exclusive flock keeps other processes from
            // resizing or writing the file while it is mapped.
            AccessMode::ReadWrite => {
                Mapping::Writable(unsafe { MmapOptions::new().map_mut(file.file())? })
            }
            // SAFETY: readers hold a shared flock, which excludes writers.
            AccessMode::ReadOnly => Mapping::ReadOnly(unsafe { Mmap::map(file.file())? }),
        };

        let mut segment = Self {
            path,
            file,
            map,
            mode,
            header: SegmentHeader::new(),
            regions: Vec::new(),
        };

        if fresh && !mode.is_read_only() {
            segment.header.dirty = true;
            segment.write_header()?;
            segment.map.flush()?;
            info!(path = ?segment.path, size = segment.size(), "created segment");
            return Ok(segment);
        }

        segment.load()?;
        if !mode.is_read_only() {
            segment.header.dirty = true;
            segment.write_header()?;
            segment.map.flush()?;
        }
        info!(
            path = ?segment.path,
            size = segment.size(),
            regions = segment.regions.len(),
            read_only = mode.is_read_only(),
            "opened segment"
        );
        Ok(segment)
    }

    fn load(&mut self) -> Result<()> {
        let bytes = self.map.bytes();
        let header = SegmentHeader::from_bytes(bytes)?;
        header.check_compatible()?;
        if header.dirty {
            return Err(Error::Dirty {
                path: self.path.clone(),
            });
        }

        let end = (HEADER_SIZE as u64)
            .checked_add(header.payload_len)
            .filter(|end| *end <= bytes.len() as u64)
            .ok_or_else(|| {
                Error::Corruption(format!(
                    "payload of {} bytes does not fit in a {} byte segment",
                    header.payload_len,
                    bytes.len()
                ))
            })?;
        let regions = decode_payload(&bytes[HEADER_SIZE..end as usize], header.payload_crc)?;

        self.header = header;
        self.regions = regions;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let bytes = self.header.to_bytes();
        self.writable("write segment header")?[..HEADER_SIZE].copy_from_slice(&bytes);
        Ok(())
    }

    fn writable(&mut self, operation: &'static str) -> Result<&mut MmapMut> {
        match &mut self.map {
            Mapping::Writable(m) => Ok(m),
            Mapping::ReadOnly(_) => Err(Error::ReadOnly { operation }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped size in bytes
    pub fn size(&self) -> u64 {
        self.map.bytes().len() as u64
    }

    /// How this segment was opened
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// True if opened read-only
    pub fn is_read_only(&self) -> bool {
        self.mode.is_read_only()
    }

    /// Header as of the last open or flush
    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// Regions as of the last open or flush
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region named `name`
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Bytes left for data once `used` bytes of live state are written
    pub fn get_free_memory(&self, used: u64) -> u64 {
        self.size().saturating_sub(HEADER_SIZE as u64 + used)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Write `regions` into the segment and sync it.
    ///
    /// Regions already in the segment whose name is not in `regions` are
    /// carried over unchanged. Fails with `SegmentExhausted`, leaving the
    /// file untouched, if the result does not fit.
    pub fn flush(&mut self, regions: Vec<Region>) -> Result<()> {
        let mut merged = regions;
        for old in &self.regions {
            if !merged.iter().any(|r| r.name == old.name) {
                merged.push(old.clone());
            }
        }

        let (payload, crc) = encode_payload(&merged)?;
        let needed = HEADER_SIZE as u64 + payload.len() as u64;
        let capacity = self.size();
        if needed > capacity {
            return Err(Error::SegmentExhausted { needed, capacity });
        }

        let map = self.writable("flush")?;
        map[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(&payload);

        self.header.payload_len = payload.len() as u64;
        self.header.payload_crc = crc;
        self.header.last_flush = chrono::Utc::now().timestamp();
        self.write_header()?;
        self.map.flush()?;

        self.regions = merged;
        Ok(())
    }

    /// Clear the dirty flag and sync; the segment may then be reopened.
    ///
    /// No-op on a read-only segment.
    pub fn mark_clean(&mut self) -> Result<()> {
        if self.is_read_only() {
            return Ok(());
        }
        self.header.dirty = false;
        self.write_header()?;
        self.map.flush()?;
        info!(path = ?self.path, "segment closed cleanly");
        Ok(())
    }

    /// Grow the segment to `size` bytes and remap it.
    pub fn resize(&mut self, size: u64) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly {
                operation: "resize",
            });
        }
        let current = self.size();
        if size < current {
            return Err(Error::InvalidResize {
                requested: size,
                current,
            });
        }
        if size == current {
            return Ok(());
        }

        self.map.flush()?;
        self.file.file().set_len(size)?;
        // SAFETY: see `open`; the exclusive flock is still held.
        self.map = Mapping::Writable(unsafe { MmapOptions::new().map_mut(self.file.file())? });
        info!(path = ?self.path, from = current, to = size, "resized segment");
        Ok(())
    }

    /// Remove the segment file in `dir`; succeeds if there is none.
    pub fn wipe(dir: impl AsRef<Path>) -> Result<()> {
        let path = dir.as_ref().join(SEGMENT_FILE_NAME);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = ?path, "wiped segment");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("size", &self.size())
            .field("mode", &self.mode)
            .field("regions", &self.regions.len())
            .finish()
    }
}
