//! Block-application scenarios

use crate::common::*;
use chainbase::Oid;

#[test]
fn test_push_then_undo_restores_pushed_state() {
    let (_dir, mut db) = temp_db();

    let mut s1 = db.start_undo_session(true).unwrap();
    add_account(&mut s1, "a", 0);
    add_account(&mut s1, "b", 0);
    s1.push();

    let mut s2 = db.start_undo_session(true).unwrap();
    s2.modify(Oid::<Account>::new(0), |a| a.name = "c".to_string())
        .unwrap();
    s2.remove(Oid::<Account>::new(1)).unwrap();
    add_account(&mut s2, "d", 0);
    s2.undo().unwrap();

    assert_eq!(
        accounts(&db),
        vec![(0, "a".to_string(), 0), (1, "b".to_string(), 0)]
    );
    let index = db.get_index::<Account>().unwrap();
    assert_eq!(index.next_id(), 2);
    assert!(index.find_by::<ByName>(&"c".to_string()).is_none());
    assert!(index.find_by::<ByName>(&"d".to_string()).is_none());
    assert_eq!(index.find_by::<ByName>(&"b".to_string()).unwrap().id.get(), 1);
}

#[test]
fn test_create_then_remove_squashes_to_nothing() {
    let (_dir, mut db) = temp_db();

    let mut s1 = db.start_undo_session(true).unwrap();
    let id = add_account(&mut s1, "a", 0);
    s1.push();
    let next_id = db.get_index::<Account>().unwrap().next_id();

    let mut s2 = db.start_undo_session(true).unwrap();
    s2.remove(id).unwrap();
    s2.squash().unwrap();

    let index = db.get_index::<Account>().unwrap();
    assert!(index.find(id).is_none());
    assert_eq!(index.next_id(), next_id);
    let merged = index.last_undo_state().unwrap();
    assert!(!merged.touches(id.get()));

    // Rolling back the merged session changes nothing visible
    db.undo().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 0);
}

#[test]
fn test_single_session_squash_keeps_changes() {
    let (_dir, mut db) = temp_db();

    let mut s1 = db.start_undo_session(true).unwrap();
    add_account(&mut s1, "a", 0);
    add_permission(&mut s1, "a", "owner");
    s1.squash().unwrap();

    assert_eq!(db.revision(), 0);
    assert_eq!(db.undo_stack_revision_range(), (0, 0));
    db.undo().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 1);
    assert_eq!(db.count::<Permission>().unwrap(), 1);
}

#[test]
fn test_key_swap_within_block() {
    let (_dir, mut db) = temp_db();
    let a = add_account(&mut db, "a", 1);
    let b = add_account(&mut db, "b", 2);

    let mut block = db.start_undo_session(true).unwrap();
    block.modify(a, |x| x.name = "tmp".to_string()).unwrap();
    block.modify(b, |x| x.name = "a".to_string()).unwrap();
    block.modify(a, |x| x.name = "b".to_string()).unwrap();
    assert_eq!(block.get_by::<Account, ByName>(&"a".to_string()).unwrap().id, b);
    block.undo().unwrap();

    assert_eq!(db.get_by::<Account, ByName>(&"a".to_string()).unwrap().id, a);
    assert_eq!(db.get_by::<Account, ByName>(&"b".to_string()).unwrap().id, b);
    assert!(db
        .find_by::<Account, ByName>(&"tmp".to_string())
        .unwrap()
        .is_none());
}

#[test]
fn test_remove_then_recreate_key() {
    let (_dir, mut db) = temp_db();
    let a = add_account(&mut db, "a", 1);

    let mut block = db.start_undo_session(true).unwrap();
    block.remove(a).unwrap();
    let again = add_account(&mut block, "a", 5);
    assert_ne!(again, a);
    block.undo().unwrap();

    assert_eq!(accounts(&db), vec![(0, "a".to_string(), 1)]);
}
