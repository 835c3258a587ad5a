//! Shared fixtures for integration tests
#![allow(dead_code)]

use chainbase::{AccessMode, Database, DatabaseConfig, Object, Oid, SecondaryIndices, SecondaryKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempDir;

/// Segment size used by most tests
pub const SEGMENT_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Oid<Account>,
    pub name: String,
    pub balance: u64,
}

pub struct ByName;

impl SecondaryKey<Account> for ByName {
    type Key = String;
    const NAME: &'static str = "by_name";

    fn key(obj: &Account) -> String {
        obj.name.clone()
    }
}

impl Object for Account {
    const TYPE_ID: u16 = 0;
    const TYPE_NAME: &'static str = "account";

    fn id(&self) -> Oid<Self> {
        self.id
    }

    fn set_id(&mut self, id: Oid<Self>) {
        self.id = id;
    }

    fn secondary_indices() -> SecondaryIndices<Self> {
        SecondaryIndices::new().with::<ByName>()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Oid<Permission>,
    pub owner: String,
    pub name: String,
}

pub struct ByOwner;

impl SecondaryKey<Permission> for ByOwner {
    type Key = (String, String);
    const NAME: &'static str = "by_owner";

    fn key(obj: &Permission) -> (String, String) {
        (obj.owner.clone(), obj.name.clone())
    }
}

impl Object for Permission {
    const TYPE_ID: u16 = 3;
    const TYPE_NAME: &'static str = "permission";

    fn id(&self) -> Oid<Self> {
        self.id
    }

    fn set_id(&mut self, id: Oid<Self>) {
        self.id = id;
    }

    fn secondary_indices() -> SecondaryIndices<Self> {
        SecondaryIndices::new().with::<ByOwner>()
    }
}

/// Same type name as `Account` with a newer schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountV2 {
    pub id: Oid<AccountV2>,
    pub name: String,
    pub balance: u64,
}

impl Object for AccountV2 {
    const TYPE_ID: u16 = 0;
    const TYPE_NAME: &'static str = "account";
    const SCHEMA_VERSION: u32 = 2;

    fn id(&self) -> Oid<Self> {
        self.id
    }

    fn set_id(&mut self, id: Oid<Self>) {
        self.id = id;
    }
}

/// `Account` with an added field under a bumped schema version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountV3 {
    pub id: Oid<AccountV3>,
    pub name: String,
    pub balance: u64,
    pub frozen: u64,
}

impl Object for AccountV3 {
    const TYPE_ID: u16 = 0;
    const TYPE_NAME: &'static str = "account";
    const SCHEMA_VERSION: u32 = 2;

    fn id(&self) -> Oid<Self> {
        self.id
    }

    fn set_id(&mut self, id: Oid<Self>) {
        self.id = id;
    }

    fn secondary_indices() -> SecondaryIndices<Self> {
        SecondaryIndices::new().with::<ByNameV3>()
    }
}

pub struct ByNameV3;

impl SecondaryKey<AccountV3> for ByNameV3 {
    type Key = String;
    const NAME: &'static str = "by_name";

    fn key(obj: &AccountV3) -> String {
        obj.name.clone()
    }
}

/// `Account` with an added field and no schema version bump
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUnversioned {
    pub id: Oid<AccountUnversioned>,
    pub name: String,
    pub balance: u64,
    pub frozen: u64,
}

impl Object for AccountUnversioned {
    const TYPE_ID: u16 = 0;
    const TYPE_NAME: &'static str = "account";

    fn id(&self) -> Oid<Self> {
        self.id
    }

    fn set_id(&mut self, id: Oid<Self>) {
        self.id = id;
    }

    fn secondary_indices() -> SecondaryIndices<Self> {
        SecondaryIndices::new().with::<ByNameUnversioned>()
    }
}

pub struct ByNameUnversioned;

impl SecondaryKey<AccountUnversioned> for ByNameUnversioned {
    type Key = String;
    const NAME: &'static str = "by_name";

    fn key(obj: &AccountUnversioned) -> String {
        obj.name.clone()
    }
}

/// A second type claiming `Account`'s type id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impostor {
    pub id: Oid<Impostor>,
}

impl Object for Impostor {
    const TYPE_ID: u16 = 0;
    const TYPE_NAME: &'static str = "impostor";

    fn id(&self) -> Oid<Self> {
        self.id
    }

    fn set_id(&mut self, id: Oid<Self>) {
        self.id = id;
    }
}

/// Open a read-write database at `path`
pub fn open_at(path: &Path) -> Database {
    Database::open(path, AccessMode::ReadWrite, SEGMENT_SIZE, DatabaseConfig::default())
        .expect("open database")
}

/// A fresh database with both fixture indices registered
pub fn temp_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut db = open_at(dir.path());
    db.add_index::<Account>().expect("add account index");
    db.add_index::<Permission>().expect("add permission index");
    (dir, db)
}

/// Create an account
pub fn add_account(db: &mut Database, name: &str, balance: u64) -> Oid<Account> {
    db.create::<Account, _>(|a| {
        a.name = name.to_string();
        a.balance = balance;
    })
    .expect("create account")
    .id
}

/// Create a permission
pub fn add_permission(db: &mut Database, owner: &str, name: &str) -> Oid<Permission> {
    db.create::<Permission, _>(|p| {
        p.owner = owner.to_string();
        p.name = name.to_string();
    })
    .expect("create permission")
    .id
}

/// Every account as (id, name, balance) in id order
pub fn accounts(db: &Database) -> Vec<(i64, String, u64)> {
    db.get_index::<Account>()
        .expect("account index")
        .iter()
        .map(|a| (a.id.get(), a.name.clone(), a.balance))
        .collect()
}
