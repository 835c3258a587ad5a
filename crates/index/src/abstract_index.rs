//! Type-erased index capability
//!
//! The database keeps heterogeneous [`VersionedIndex`] values in one table
//! addressed by type-id. [`AbstractIndex`] is the versioning surface it fans
//! session operations out over; typed access goes through `as_any`.

use crate::index::VersionedIndex;
use chainbase_core::{Error, LayoutDescriptor, Object, Result};
use std::any::Any;

/// Versioned collection of some record type.
pub trait AbstractIndex: Send + Sync {
    /// Routing id of the stored type
    fn record_type_id(&self) -> u16;

    /// Name of the stored type
    fn type_name(&self) -> &'static str;

    /// Layout recorded for this index
    fn layout(&self) -> &LayoutDescriptor;

    /// Check the recorded layout against the compiled one
    fn validate(&self) -> Result<()>;

    /// Current revision
    fn revision(&self) -> i64;

    /// Set the revision; fails with sessions open
    fn set_revision(&mut self, revision: i64) -> Result<()>;

    /// Id the next creation will allocate
    fn next_id(&self) -> i64;

    /// (oldest reachable revision, current revision)
    fn undo_stack_revision_range(&self) -> (i64, i64);

    /// Number of open sessions
    fn undo_stack_len(&self) -> usize;

    /// Open a session and return its revision
    fn begin_undo_session(&mut self) -> i64;

    /// Revert the innermost session
    fn undo(&mut self) -> Result<()>;

    /// Merge the two innermost sessions
    fn squash(&mut self) -> Result<()>;

    /// Discard undo states up to `revision`
    fn commit(&mut self, revision: i64);

    /// Revert every open session
    fn undo_all(&mut self) -> Result<()>;

    /// Number of live records
    fn row_count(&self) -> usize;

    /// Serialized size of the live table
    fn footprint(&self) -> u64;

    /// Encode the live table for the segment
    fn encode_rows(&self) -> Result<Vec<u8>>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Object> VersionedIndex<T> {
    /// Decode rows produced by [`AbstractIndex::encode_rows`] and rebuild.
    ///
    /// `layout` is checked against the compiled layout before any row is
    /// decoded. Rows that fail to decode under a matching layout are
    /// corruption.
    pub fn decode(
        layout: LayoutDescriptor,
        revision: i64,
        next_id: i64,
        rows: &[u8],
    ) -> Result<Self> {
        layout.check(&LayoutDescriptor::of::<T>())?;
        let rows: Vec<T> = bincode::deserialize(rows).map_err(|e| {
            Error::Corruption(format!("{} rows failed to decode: {}", T::TYPE_NAME, e))
        })?;
        Self::from_persisted(layout, revision, next_id, rows)
    }
}

impl<T: Object> AbstractIndex for VersionedIndex<T> {
    fn record_type_id(&self) -> u16 {
        T::TYPE_ID
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn layout(&self) -> &LayoutDescriptor {
        VersionedIndex::layout(self)
    }

    fn validate(&self) -> Result<()> {
        VersionedIndex::validate(self)
    }

    fn revision(&self) -> i64 {
        VersionedIndex::revision(self)
    }

    fn set_revision(&mut self, revision: i64) -> Result<()> {
        VersionedIndex::set_revision(self, revision)
    }

    fn next_id(&self) -> i64 {
        VersionedIndex::next_id(self)
    }

    fn undo_stack_revision_range(&self) -> (i64, i64) {
        VersionedIndex::undo_stack_revision_range(self)
    }

    fn undo_stack_len(&self) -> usize {
        VersionedIndex::undo_stack_len(self)
    }

    fn begin_undo_session(&mut self) -> i64 {
        VersionedIndex::begin_undo_session(self)
    }

    fn undo(&mut self) -> Result<()> {
        VersionedIndex::undo(self)
    }

    fn squash(&mut self) -> Result<()> {
        VersionedIndex::squash(self)
    }

    fn commit(&mut self, revision: i64) {
        VersionedIndex::commit(self, revision)
    }

    fn undo_all(&mut self) -> Result<()> {
        VersionedIndex::undo_all(self)
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn footprint(&self) -> u64 {
        VersionedIndex::footprint(self)
    }

    fn encode_rows(&self) -> Result<Vec<u8>> {
        let rows: Vec<&T> = self.iter().collect();
        Ok(bincode::serialize(&rows)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
