//! Record identity
//!
//! Every stored record has a type-id (a dense, schema-assigned integer used
//! to route it to its index) and a per-type [`Oid`] assigned by the store.
//!
//! # Example
//!
//! ```
//! use chainbase_core::{Object, Oid};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Account {
//!     id: Oid<Account>,
//!     name: String,
//! }
//!
//! impl Object for Account {
//!     const TYPE_ID: u16 = 0;
//!     const TYPE_NAME: &'static str = "account";
//!
//!     fn id(&self) -> Oid<Self> {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: Oid<Self>) {
//!         self.id = id;
//!     }
//! }
//!
//! assert_eq!(Account::default().id(), Oid::new(0));
//! ```

use crate::secondary::SecondaryIndices;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed record id.
///
/// The type parameter keeps ids of different record types from being mixed
/// up; the representation is a plain `i64`, as persisted.
pub struct Oid<T> {
    raw: i64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Oid<T> {
    /// Wrap a raw id
    pub const fn new(raw: i64) -> Self {
        Oid {
            raw,
            _marker: PhantomData,
        }
    }

    /// Raw id value
    #[inline]
    pub const fn get(self) -> i64 {
        self.raw
    }
}

// Manual impls: derives would put bounds on `T`.

impl<T> Clone for Oid<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Oid<T> {}

impl<T> Default for Oid<T> {
    fn default() -> Self {
        Oid::new(0)
    }
}

impl<T> PartialEq for Oid<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Oid<T> {}

impl<T> PartialOrd for Oid<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Oid<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Oid<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}

impl<T> fmt::Debug for Oid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.raw)
    }
}

impl<T> fmt::Display for Oid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T> Serialize for Oid<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.raw)
    }
}

impl<'de, T> Deserialize<'de> for Oid<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Oid::new)
    }
}

/// Contract every record type satisfies.
///
/// The store owns the `id` field: it is assigned on creation and restored if
/// a mutator changes it. Everything else is payload.
pub trait Object:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Dense routing id, unique across the schema
    const TYPE_ID: u16;

    /// Stable name; also names the type's region in the segment
    const TYPE_NAME: &'static str;

    /// Bumped whenever the persisted encoding of the type changes
    const SCHEMA_VERSION: u32 = 1;

    /// This record's id
    fn id(&self) -> Oid<Self>;

    /// Overwrite this record's id (store use only)
    fn set_id(&mut self, id: Oid<Self>);

    /// Secondary orderings maintained alongside the primary id ordering
    fn secondary_indices() -> SecondaryIndices<Self> {
        SecondaryIndices::new()
    }
}
