//! Registration and typed routing

use crate::common::*;
use chainbase::{Error, Oid};

#[test]
fn test_revision_without_indices() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_at(dir.path());
    assert_eq!(db.revision(), -1);
    assert_eq!(db.index_count(), 0);
}

#[test]
fn test_double_registration_is_fatal() {
    let (_dir, mut db) = temp_db();
    let err = db.add_index::<Account>().unwrap_err();
    assert!(matches!(err, Error::DoubleRegistration { type_id: 0, .. }));
    assert!(err.is_fatal());

    let err = db.add_index::<Impostor>().unwrap_err();
    assert!(matches!(err, Error::DoubleRegistration { .. }));
    assert_eq!(db.index_count(), 2);
}

#[test]
fn test_unregistered_type() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();

    let err = db.count::<Permission>().unwrap_err();
    assert!(matches!(err, Error::UnregisteredType { type_name: "permission" }));
    assert!(db
        .create::<Permission, _>(|p| p.name = "active".to_string())
        .is_err());
}

#[test]
fn test_typed_routing() {
    let (_dir, mut db) = temp_db();
    let alice = add_account(&mut db, "alice", 10);
    let perm = add_permission(&mut db, "alice", "owner");

    // Ids are allocated per type
    assert_eq!(alice.get(), 0);
    assert_eq!(perm.get(), 0);

    assert_eq!(db.get(alice).unwrap().balance, 10);
    assert_eq!(db.get(perm).unwrap().name, "owner");
    assert_eq!(
        db.get_by::<Account, ByName>(&"alice".to_string()).unwrap().id,
        alice
    );
    let key = ("alice".to_string(), "owner".to_string());
    assert_eq!(db.find_by::<Permission, ByOwner>(&key).unwrap().unwrap().id, perm);
    assert_eq!(db.count::<Account>().unwrap(), 1);

    db.modify(alice, |a| a.balance += 5).unwrap();
    assert_eq!(db.get(alice).unwrap().balance, 15);

    let removed = db.remove(perm).unwrap();
    assert_eq!(removed.owner, "alice");
    assert!(db.find(perm).unwrap().is_none());
    assert!(db.get(perm).unwrap_err().is_not_found());
}

#[test]
fn test_uniqueness_is_per_type() {
    let (_dir, mut db) = temp_db();
    add_account(&mut db, "alice", 1);

    let err = db
        .create::<Account, _>(|a| a.name = "alice".to_string())
        .unwrap_err();
    assert!(err.is_uniqueness_violation());
    assert_eq!(db.get_index::<Account>().unwrap().next_id(), 1);

    // Same name, different ordering, different type
    add_permission(&mut db, "alice", "alice");
}

#[test]
fn test_try_modify_reports_mutator_error() {
    let (_dir, mut db) = temp_db();
    let id = add_account(&mut db, "alice", 1);
    let err = db
        .try_modify(id, |a: &mut Account| {
            a.balance = 99;
            Err("insufficient funds")
        })
        .unwrap_err();
    assert!(matches!(err, Error::Mutator { type_name: "account", .. }));
    assert_eq!(db.get(id).unwrap().balance, 99);
}

#[test]
fn test_index_handle() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_at(dir.path());
    let handle = db.add_index::<Account>().unwrap();
    assert_eq!(handle.type_id(), 0);
    add_account(&mut db, "alice", 1);
    assert_eq!(db.index(handle).unwrap().len(), 1);
}

#[test]
fn test_late_index_is_aligned() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_at(dir.path());
    db.add_index::<Account>().unwrap();
    db.set_revision(7).unwrap();
    db.start_undo_session(true).unwrap().push();
    db.start_undo_session(true).unwrap().push();
    assert_eq!(db.undo_stack_revision_range(), (7, 9));

    db.add_index::<Permission>().unwrap();
    let perms = db.get_index::<Permission>().unwrap();
    assert_eq!(perms.revision(), 9);
    assert_eq!(perms.undo_stack_revision_range(), (7, 9));

    // Both indices unwind together
    db.undo_all().unwrap();
    assert_eq!(db.revision(), 7);
    assert_eq!(db.get_index::<Permission>().unwrap().revision(), 7);
}

#[test]
fn test_set_revision_with_open_session() {
    let (_dir, mut db) = temp_db();
    db.start_undo_session(true).unwrap().push();
    let err = db.set_revision(3).unwrap_err();
    assert!(matches!(err, Error::RevisionConflict(_)));
    db.commit(db.revision()).unwrap();
    db.set_revision(3).unwrap();
    assert_eq!(db.revision(), 3);
    assert_eq!(db.get_index::<Permission>().unwrap().revision(), 3);
}

#[test]
fn test_free_memory_tracks_live_data() {
    let (_dir, mut db) = temp_db();
    let empty = db.get_free_memory();
    assert!(empty < db.get_segment_size());

    let id = add_account(&mut db, "alice", 1);
    let one = db.get_free_memory();
    assert!(one < empty);

    db.remove(id).unwrap();
    assert_eq!(db.get_free_memory(), empty);
}

#[test]
fn test_modify_missing_record() {
    let (_dir, mut db) = temp_db();
    let err = db.modify(Oid::<Account>::new(5), |_| {}).unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_fatal());
}
