//! Store lock and check-locking

use crate::common::*;
use chainbase::{DatabaseConfig, Error, OpenOptions, SharedDatabase};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn shared_db(dir: &std::path::Path, config: DatabaseConfig) -> SharedDatabase {
    let shared = OpenOptions::new(dir)
        .size(SEGMENT_SIZE)
        .config(config)
        .open_shared()
        .unwrap();
    shared.with_write_lock(|db| {
        db.add_index::<Account>().unwrap();
        db.add_index::<Permission>().unwrap();
    });
    shared
}

#[test]
fn test_read_and_write_closures() {
    let dir = tempfile::tempdir().unwrap();
    let shared = shared_db(dir.path(), DatabaseConfig::default());

    let id = shared.with_write_lock(|db| add_account(db, "alice", 10));
    let balance = shared
        .with_read_lock(None, |db| db.get(id).unwrap().balance)
        .unwrap();
    assert_eq!(balance, 10);

    {
        let guard = shared.read();
        assert_eq!(guard.count::<Account>().unwrap(), 1);
    }
    {
        let mut guard = shared.write();
        guard.modify(id, |a| a.balance = 11).unwrap();
    }
    assert_eq!(shared.read().get(id).unwrap().balance, 11);
}

#[test]
fn test_sessions_under_write_lock() {
    let dir = tempfile::tempdir().unwrap();
    let shared = shared_db(dir.path(), DatabaseConfig::default());

    shared
        .with_write_lock(|db| -> chainbase::Result<()> {
            let mut session = db.start_undo_session(true)?;
            add_account(&mut session, "alice", 1);
            session.undo()
        })
        .unwrap();
    assert_eq!(shared.read().count::<Account>().unwrap(), 0);
}

#[test]
fn test_bounded_read_times_out_under_writer() {
    let dir = tempfile::tempdir().unwrap();
    let shared = Arc::new(shared_db(dir.path(), DatabaseConfig::default()));
    let held = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let writer = {
        let shared = Arc::clone(&shared);
        let held = Arc::clone(&held);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            let mut guard = shared.write();
            add_account(&mut guard, "alice", 1);
            held.wait();
            release.wait();
        })
    };

    held.wait();
    let err = shared
        .with_read_lock(Some(Duration::from_millis(20)), |db| db.revision())
        .unwrap_err();
    assert!(matches!(err, Error::LockTimeout { timeout_ms: 20 }));
    assert!(err.is_retryable());
    assert!(shared.try_read_for(Duration::from_millis(5)).is_err());
    release.wait();
    writer.join().unwrap();

    // The writer's change is visible once the lock is free
    let count = shared
        .with_read_lock(Some(Duration::from_secs(5)), |db| db.count::<Account>().unwrap())
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_configured_default_read_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        default_read_timeout_ms: Some(10),
        ..DatabaseConfig::default()
    };
    let shared = Arc::new(shared_db(dir.path(), config));
    let held = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let writer = {
        let shared = Arc::clone(&shared);
        let held = Arc::clone(&held);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            let _guard = shared.write();
            held.wait();
            release.wait();
        })
    };

    held.wait();
    let err = shared.with_read_lock(None, |db| db.revision()).unwrap_err();
    assert!(matches!(err, Error::LockTimeout { timeout_ms: 10 }));
    release.wait();
    writer.join().unwrap();
}

#[test]
fn test_check_locking() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        check_locking: true,
        ..DatabaseConfig::default()
    };
    let shared = shared_db(dir.path(), config);

    let id = shared.with_write_lock(|db| add_account(db, "alice", 1));
    let found = shared
        .with_read_lock(None, |db| db.find(id).unwrap().is_some())
        .unwrap();
    assert!(found);

    let mut db = shared.into_inner();
    let err = db.find(id).unwrap_err();
    assert!(matches!(err, Error::LockViolation { required: "read", .. }));
    let err = db.remove(id).unwrap_err();
    assert!(matches!(err, Error::LockViolation { required: "write", .. }));
}

#[test]
fn test_check_locking_off_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let shared = shared_db(dir.path(), DatabaseConfig::default());
    let mut db = shared.into_inner();
    let id = add_account(&mut db, "alice", 1);
    assert!(db.find(id).unwrap().is_some());
}

#[test]
fn test_readers_run_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let shared = Arc::new(shared_db(dir.path(), DatabaseConfig::default()));
    shared.with_write_lock(|db| {
        add_account(db, "alice", 1);
    });

    let both = Arc::new(Barrier::new(2));
    let reader = {
        let shared = Arc::clone(&shared);
        let both = Arc::clone(&both);
        thread::spawn(move || {
            let guard = shared.read();
            both.wait();
            guard.count::<Account>().unwrap()
        })
    };

    // Both threads hold the read lock at the barrier
    let guard = shared.read();
    both.wait();
    assert_eq!(guard.count::<Account>().unwrap(), 1);
    drop(guard);
    assert_eq!(reader.join().unwrap(), 1);
}
