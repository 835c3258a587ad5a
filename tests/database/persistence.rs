//! Segment persistence across reopen

use crate::common::*;
use chainbase::{AccessMode, Database, DatabaseConfig, Error, OpenOptions, SEGMENT_FILE_NAME};
use std::fs::OpenOptions as FileOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

fn read_only(path: &Path) -> chainbase::Result<Database> {
    OpenOptions::new(path).read_only().open()
}

#[test]
fn test_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        db.add_index::<Permission>().unwrap();
        add_account(&mut db, "alice", 10);
        let bob = add_account(&mut db, "bob", 20);
        add_permission(&mut db, "alice", "owner");
        db.remove(bob).unwrap();
        db.set_revision(42).unwrap();
        db.close().unwrap();
    }

    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();
    db.add_index::<Permission>().unwrap();
    assert_eq!(db.revision(), 42);
    assert_eq!(accounts(&db), vec![(0, "alice".to_string(), 10)]);
    assert_eq!(db.count::<Permission>().unwrap(), 1);

    // The id allocator survives too
    assert_eq!(add_account(&mut db, "carol", 1).get(), 2);
    assert!(db
        .get_by::<Account, ByName>(&"bob".to_string())
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_drop_closes_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 10);
    }
    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 1);
}

#[test]
fn test_dirty_segment_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    open_at(dir.path()).close().unwrap();

    // Set the dirty byte as a crashed writer would have left it
    let mut file = FileOptions::new()
        .write(true)
        .open(dir.path().join(SEGMENT_FILE_NAME))
        .unwrap();
    file.seek(SeekFrom::Start(12)).unwrap();
    file.write_all(&[1]).unwrap();
    drop(file);

    let err = Database::open(
        dir.path(),
        AccessMode::ReadWrite,
        SEGMENT_SIZE,
        DatabaseConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Dirty { .. }));
}

#[test]
fn test_schema_change_is_structural_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 1);
        db.close().unwrap();
    }
    let mut db = open_at(dir.path());
    let err = db.add_index::<AccountV2>().unwrap_err();
    assert!(matches!(err, Error::StructuralMismatch { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_added_field_is_structural_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 1);
        add_account(&mut db, "bob", 2);
        db.close().unwrap();
    }
    let mut db = open_at(dir.path());
    let err = db.add_index::<AccountV3>().unwrap_err();
    assert!(matches!(err, Error::StructuralMismatch { .. }), "{:?}", err);
    assert!(err.is_fatal());
    assert_eq!(db.index_count(), 0);
}

#[test]
fn test_added_field_without_version_bump_is_structural_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 1);
        db.close().unwrap();
    }
    let mut db = open_at(dir.path());
    let err = db.add_index::<AccountUnversioned>().unwrap_err();
    assert!(matches!(err, Error::StructuralMismatch { .. }), "{:?}", err);
    assert!(err.to_string().contains("default record size"));
}

#[test]
fn test_stored_revision_must_match() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        db.set_revision(5).unwrap();
        db.close().unwrap();
    }
    let mut db = open_at(dir.path());
    db.add_index::<Permission>().unwrap();
    let err = db.add_index::<Account>().unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { type_name: "account", .. }));
}

#[test]
fn test_unregistered_regions_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        db.add_index::<Permission>().unwrap();
        add_permission(&mut db, "alice", "owner");
        db.close().unwrap();
    }
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 3);
        db.close().unwrap();
    }
    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();
    db.add_index::<Permission>().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 1);
    assert_eq!(db.count::<Permission>().unwrap(), 1);
}

#[test]
fn test_read_only_database() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 10);
        db.close().unwrap();
    }

    let mut db = read_only(dir.path()).unwrap();
    assert!(db.is_read_only());
    db.add_index::<Account>().unwrap();
    assert_eq!(db.get_by::<Account, ByName>(&"alice".to_string()).unwrap().balance, 10);

    let err = db
        .create::<Account, _>(|a| a.name = "bob".to_string())
        .unwrap_err();
    assert!(matches!(err, Error::ReadOnly { operation: "create" }));
    assert!(db.start_undo_session(true).is_err());
    assert!(matches!(db.flush(), Err(Error::ReadOnly { .. })));
    assert!(db.resize(SEGMENT_SIZE * 2).is_err());

    let err = db.add_index::<Permission>().unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));

    // Readers share the segment
    let second = read_only(dir.path()).unwrap();
    drop(second);
}

#[test]
fn test_read_only_needs_existing_segment() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_only(&dir.path().join("absent")).is_err());
}

#[cfg(unix)]
#[test]
fn test_second_writer_is_locked_out() {
    let dir = tempfile::tempdir().unwrap();
    let _db = open_at(dir.path());
    let err = OpenOptions::new(dir.path()).open().unwrap_err();
    assert!(matches!(err, Error::AlreadyLocked { .. }));
    assert!(read_only(dir.path()).is_err());
}

#[test]
fn test_segment_exhaustion_and_resize() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = OpenOptions::new(dir.path()).size(4096).open().unwrap();
    db.add_index::<Account>().unwrap();
    for i in 0..100 {
        add_account(&mut db, &format!("account-with-a-long-name-{:04}", i), i);
    }
    assert_eq!(db.get_free_memory(), 0);

    let err = db.flush().unwrap_err();
    assert!(matches!(err, Error::SegmentExhausted { capacity: 4096, .. }));

    assert!(matches!(
        db.resize(1024),
        Err(Error::InvalidResize { requested: 1024, current: 4096 })
    ));
    db.resize(SEGMENT_SIZE).unwrap();
    assert_eq!(db.get_segment_size(), SEGMENT_SIZE);
    assert!(db.get_free_memory() > 0);
    db.close().unwrap();

    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 100);
}

#[test]
fn test_segment_smaller_than_header() {
    let dir = tempfile::tempdir().unwrap();
    let err = OpenOptions::new(dir.path()).size(16).open().unwrap_err();
    assert!(matches!(err, Error::InvalidResize { .. }));
}

#[test]
fn test_wipe() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = open_at(dir.path());
        db.add_index::<Account>().unwrap();
        add_account(&mut db, "alice", 10);
        db.close().unwrap();
    }
    Database::wipe(dir.path()).unwrap();
    Database::wipe(dir.path()).unwrap();

    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 0);
}
