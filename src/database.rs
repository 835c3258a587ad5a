//! Main database entry point.
//!
//! A [`Database`] owns one [`VersionedIndex`] per registered record type,
//! kept in a dense table addressed by `Object::TYPE_ID`, and the segment
//! those indices are persisted to.
//!
//! # Example
//!
//! ```ignore
//! use chainbase::prelude::*;
//!
//! let mut db = Database::open("./state", AccessMode::ReadWrite, 1 << 20, DatabaseConfig::default())?;
//! let accounts = db.add_index::<Account>()?;
//!
//! let session = db.start_undo_session(true)?;
//! // ... apply a block through `session` ...
//! session.push();
//!
//! db.commit(db.revision())?;
//! db.close()?;
//! ```
//!
//! All indices share one revision: session operations fan out over every
//! index in registration order.

use crate::config::{AccessMode, DatabaseConfig};
use crate::session::Session;
use chainbase_concurrency::LockCounters;
use chainbase_core::{BoxError, Error, LayoutDescriptor, Object, Oid, Result, SecondaryKey};
use chainbase_index::{AbstractIndex, VersionedIndex};
use chainbase_storage::{Region, Segment};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Typed proof that `T`'s index was added to a database.
pub struct IndexHandle<T> {
    type_id: u16,
    _marker: PhantomData<fn() -> T>,
}

impl<T> IndexHandle<T> {
    /// Routing id of the indexed type
    pub fn type_id(&self) -> u16 {
        self.type_id
    }
}

impl<T> Clone for IndexHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for IndexHandle<T> {}

impl<T> std::fmt::Debug for IndexHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("type_id", &self.type_id)
            .finish()
    }
}

/// A chainbase database.
pub struct Database {
    /// Database directory
    dir: PathBuf,

    /// Backing segment
    segment: Segment,

    /// Indices by type id
    indices: Vec<Option<Box<dyn AbstractIndex>>>,

    /// Type ids in registration order; fan-out follows this order
    order: Vec<u16>,

    config: DatabaseConfig,

    /// Held-guard counts shared with the store lock
    counters: Arc<LockCounters>,

    /// Set once the segment has been marked clean
    closed: bool,
}

impl Database {
    /// Open the database in `dir`.
    ///
    /// `size` is the minimum segment size; see [`Segment::open`].
    pub fn open(
        dir: impl AsRef<Path>,
        access_mode: AccessMode,
        size: u64,
        config: DatabaseConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let segment = Segment::open(&dir, size, access_mode)?;
        info!(
            path = ?dir,
            read_only = access_mode.is_read_only(),
            check_locking = config.check_locking,
            "opened database"
        );
        Ok(Self {
            dir,
            segment,
            indices: Vec::new(),
            order: Vec::new(),
            config,
            counters: Arc::new(LockCounters::new()),
            closed: false,
        })
    }

    /// Remove the segment in `dir`. The database there must not be open.
    pub fn wipe(dir: impl AsRef<Path>) -> Result<()> {
        Segment::wipe(dir)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `T`'s index.
    ///
    /// If the segment already holds a region for `T` it is loaded and its
    /// layout validated; otherwise an empty index is created and aligned to
    /// the revision and session depth of the first registered index.
    pub fn add_index<T: Object>(&mut self) -> Result<IndexHandle<T>> {
        let slot = T::TYPE_ID as usize;
        if let Some(Some(existing)) = self.indices.get(slot) {
            let err = Error::DoubleRegistration {
                type_id: T::TYPE_ID,
                type_name: T::TYPE_NAME,
            };
            error!(existing = existing.type_name(), error = %err, "add_index failed");
            return Err(err);
        }

        let expected = self.first().map(|idx| idx.undo_stack_revision_range());
        let index = match self.segment.region(T::TYPE_NAME) {
            Some(region) => {
                // Layout first: rows of a changed schema may not even decode
                if let Err(err) = region.layout.check(&LayoutDescriptor::of::<T>()) {
                    error!(error = %err, "add_index failed");
                    return Err(err);
                }
                let index = VersionedIndex::<T>::decode(
                    region.layout.clone(),
                    region.revision,
                    region.next_id,
                    &region.rows,
                )?;
                if let Some(expected) = expected {
                    let found = index.undo_stack_revision_range();
                    if found != expected {
                        let err = Error::SchemaMismatch {
                            type_name: T::TYPE_NAME,
                            reason: format!(
                                "stored revision range {:?} differs from the database's {:?}",
                                found, expected
                            ),
                        };
                        error!(error = %err, "add_index failed");
                        return Err(err);
                    }
                }
                debug!(type_name = T::TYPE_NAME, rows = index.len(), "loaded index");
                index
            }
            None => {
                if self.is_read_only() {
                    let err = Error::SchemaMismatch {
                        type_name: T::TYPE_NAME,
                        reason: "index is absent from a read-only database".to_string(),
                    };
                    error!(error = %err, "add_index failed");
                    return Err(err);
                }
                let mut index = VersionedIndex::<T>::new();
                if let Some((base, current)) = expected {
                    index.set_revision(base)?;
                    while index.revision() < current {
                        index.begin_undo_session();
                    }
                }
                debug!(type_name = T::TYPE_NAME, revision = index.revision(), "created index");
                index
            }
        };

        if self.indices.len() <= slot {
            self.indices.resize_with(slot + 1, || None);
        }
        self.indices[slot] = Some(Box::new(index));
        self.order.push(T::TYPE_ID);
        Ok(IndexHandle {
            type_id: T::TYPE_ID,
            _marker: PhantomData,
        })
    }

    /// Number of registered indices
    pub fn index_count(&self) -> usize {
        self.order.len()
    }

    fn first(&self) -> Option<&dyn AbstractIndex> {
        let id = *self.order.first()?;
        self.indices.get(id as usize)?.as_deref()
    }

    fn registered(&self) -> impl Iterator<Item = &dyn AbstractIndex> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.indices.get(*id as usize)?.as_deref())
    }

    fn for_each_index<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut dyn AbstractIndex) -> Result<()>,
    {
        for id in &self.order {
            if let Some(Some(index)) = self.indices.get_mut(*id as usize) {
                f(index.as_mut())?;
            }
        }
        Ok(())
    }

    fn typed<T: Object>(&self) -> Result<&VersionedIndex<T>> {
        self.indices
            .get(T::TYPE_ID as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|index| index.as_any().downcast_ref::<VersionedIndex<T>>())
            .ok_or(Error::UnregisteredType {
                type_name: T::TYPE_NAME,
            })
    }

    fn typed_mut<T: Object>(&mut self) -> Result<&mut VersionedIndex<T>> {
        self.indices
            .get_mut(T::TYPE_ID as usize)
            .and_then(|slot| slot.as_mut())
            .and_then(|index| index.as_any_mut().downcast_mut::<VersionedIndex<T>>())
            .ok_or(Error::UnregisteredType {
                type_name: T::TYPE_NAME,
            })
    }

    // ========================================================================
    // Lock and mode checks
    // ========================================================================

    fn check_read(&self, operation: &'static str) -> Result<()> {
        if self.config.check_locking {
            self.counters.require_read(operation)?;
        }
        Ok(())
    }

    fn check_write(&self, operation: &'static str) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly { operation });
        }
        if self.config.check_locking {
            self.counters.require_write(operation)?;
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// `T`'s index
    pub fn get_index<T: Object>(&self) -> Result<&VersionedIndex<T>> {
        self.check_read("get_index")?;
        self.typed::<T>()
    }

    /// `T`'s index, for direct mutation
    pub fn get_mutable_index<T: Object>(&mut self) -> Result<&mut VersionedIndex<T>> {
        self.check_write("get_mutable_index")?;
        self.typed_mut::<T>()
    }

    /// The index behind `handle`
    pub fn index<T: Object>(&self, handle: IndexHandle<T>) -> Result<&VersionedIndex<T>> {
        debug_assert_eq!(handle.type_id, T::TYPE_ID);
        self.get_index::<T>()
    }

    /// Record by id
    pub fn find<T: Object>(&self, id: Oid<T>) -> Result<Option<&T>> {
        self.check_read("find")?;
        Ok(self.typed::<T>()?.find(id))
    }

    /// Record by id, or `NotFound`
    pub fn get<T: Object>(&self, id: Oid<T>) -> Result<&T> {
        self.check_read("get")?;
        self.typed::<T>()?.get(id)
    }

    /// Record by secondary key
    pub fn find_by<T: Object, K: SecondaryKey<T>>(&self, key: &K::Key) -> Result<Option<&T>> {
        self.check_read("find_by")?;
        Ok(self.typed::<T>()?.find_by::<K>(key))
    }

    /// Record by secondary key, or `NotFound`
    pub fn get_by<T: Object, K: SecondaryKey<T>>(&self, key: &K::Key) -> Result<&T> {
        self.check_read("get_by")?;
        self.typed::<T>()?.get_by::<K>(key)
    }

    /// Number of live `T` records
    pub fn count<T: Object>(&self) -> Result<usize> {
        self.check_read("count")?;
        Ok(self.typed::<T>()?.len())
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a `T`; see [`VersionedIndex::emplace`]
    pub fn create<T, F>(&mut self, init: F) -> Result<&T>
    where
        T: Object,
        F: FnOnce(&mut T),
    {
        self.check_write("create")?;
        self.typed_mut::<T>()?.emplace(init)
    }

    /// Modify a `T`; see [`VersionedIndex::modify`]
    pub fn modify<T, F>(&mut self, id: Oid<T>, mutator: F) -> Result<()>
    where
        T: Object,
        F: FnOnce(&mut T),
    {
        self.check_write("modify")?;
        self.typed_mut::<T>()?.modify(id, mutator)
    }

    /// Modify a `T` with a fallible mutator; see [`VersionedIndex::try_modify`]
    pub fn try_modify<T, F, E>(&mut self, id: Oid<T>, mutator: F) -> Result<()>
    where
        T: Object,
        F: FnOnce(&mut T) -> std::result::Result<(), E>,
        E: Into<BoxError>,
    {
        self.check_write("try_modify")?;
        self.typed_mut::<T>()?.try_modify(id, mutator)
    }

    /// Remove a `T`, returning it
    pub fn remove<T: Object>(&mut self, id: Oid<T>) -> Result<T> {
        self.check_write("remove")?;
        self.typed_mut::<T>()?.remove(id)
    }

    // ========================================================================
    // Versioning
    // ========================================================================

    /// Revision of the first registered index, or -1 with none registered
    pub fn revision(&self) -> i64 {
        self.first().map_or(-1, |idx| idx.revision())
    }

    /// (oldest reachable revision, current revision) of the first index
    pub fn undo_stack_revision_range(&self) -> (i64, i64) {
        self.first()
            .map_or((-1, -1), |idx| idx.undo_stack_revision_range())
    }

    /// Set every index's revision; only legal with no session open
    pub fn set_revision(&mut self, revision: i64) -> Result<()> {
        self.check_write("set_revision")?;
        if let Some(open) = self.registered().find(|idx| idx.undo_stack_len() > 0) {
            return Err(Error::RevisionConflict(format!(
                "cannot set revision while {} sessions are open on {}",
                open.undo_stack_len(),
                open.type_name()
            )));
        }
        self.for_each_index(|idx| idx.set_revision(revision))
    }

    /// Open a session on every index.
    ///
    /// A disabled session records nothing and its disposal does nothing.
    pub fn start_undo_session(&mut self, enabled: bool) -> Result<Session<'_>> {
        self.check_write("start_undo_session")?;
        if !enabled {
            return Ok(Session::disabled(self));
        }
        for id in &self.order {
            if let Some(Some(index)) = self.indices.get_mut(*id as usize) {
                index.begin_undo_session();
            }
        }
        let revision = self.revision();
        debug!(revision, "started undo session");
        Ok(Session::new(self, revision))
    }

    /// Revert the innermost session of every index
    pub fn undo(&mut self) -> Result<()> {
        self.check_write("undo")?;
        self.undo_indices()
    }

    /// Merge the two innermost sessions of every index
    pub fn squash(&mut self) -> Result<()> {
        self.check_write("squash")?;
        self.squash_indices()
    }

    /// Discard undo history up to and including `revision`
    pub fn commit(&mut self, revision: i64) -> Result<()> {
        self.check_write("commit")?;
        self.for_each_index(|idx| {
            idx.commit(revision);
            Ok(())
        })?;
        debug!(revision, "committed");
        Ok(())
    }

    /// Revert every open session of every index
    pub fn undo_all(&mut self) -> Result<()> {
        self.check_write("undo_all")?;
        self.for_each_index(|idx| idx.undo_all())
    }

    pub(crate) fn undo_indices(&mut self) -> Result<()> {
        self.for_each_index(|idx| idx.undo())
    }

    pub(crate) fn squash_indices(&mut self) -> Result<()> {
        self.for_each_index(|idx| idx.squash())
    }

    // ========================================================================
    // Segment
    // ========================================================================

    /// Write every live table into the segment
    pub fn flush(&mut self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly { operation: "flush" });
        }
        let regions = self
            .registered()
            .map(|idx| -> Result<Region> {
                Ok(Region {
                    name: idx.type_name().to_string(),
                    layout: idx.layout().clone(),
                    revision: idx.revision(),
                    next_id: idx.next_id(),
                    rows: idx.encode_rows()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.segment.flush(regions)
    }

    /// Grow the segment
    pub fn resize(&mut self, size: u64) -> Result<()> {
        self.segment.resize(size)
    }

    /// Flush and mark the segment clean
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.is_read_only() {
            return Ok(());
        }
        if let Some(open) = self.registered().find(|idx| idx.undo_stack_len() > 0) {
            warn!(
                type_name = open.type_name(),
                sessions = open.undo_stack_len(),
                "closing with open undo sessions; their changes are kept"
            );
        }
        self.flush()?;
        self.segment.mark_clean()?;
        info!(path = ?self.dir, "closed database");
        Ok(())
    }

    /// Bytes left in the segment after the live tables
    pub fn get_free_memory(&self) -> u64 {
        let used = self.registered().map(|idx| idx.footprint()).sum();
        self.segment.get_free_memory(used)
    }

    /// Segment size in bytes
    pub fn get_segment_size(&self) -> u64 {
        self.segment.size()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Database directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// True if opened read-only
    pub fn is_read_only(&self) -> bool {
        self.segment.is_read_only()
    }

    /// Runtime configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) fn lock_counters(&self) -> Arc<LockCounters> {
        Arc::clone(&self.counters)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(path = ?self.dir, error = %e, "failed to close database");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.dir)
            .field("indices", &self.order.len())
            .field("revision", &self.revision())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}
