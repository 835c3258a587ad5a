//! Secondary orderings
//!
//! A record type declares zero or more unique orderings besides the primary
//! id ordering. Each ordering is a tag type implementing [`SecondaryKey`];
//! the set of orderings for a type is a [`SecondaryIndices`] value returned
//! from [`Object::secondary_indices`](crate::Object::secondary_indices).
//!
//! ```ignore
//! struct ByName;
//!
//! impl SecondaryKey<Account> for ByName {
//!     type Key = String;
//!     const NAME: &'static str = "by_name";
//!
//!     fn key(obj: &Account) -> String {
//!         obj.name.clone()
//!     }
//! }
//!
//! fn secondary_indices() -> SecondaryIndices<Account> {
//!     SecondaryIndices::new().with::<ByName>()
//! }
//! ```
//!
//! Orderings are always unique. A non-unique logical key is made unique the
//! usual way, by appending the record id to a composite key.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::RangeBounds;

/// A named, unique secondary ordering over records of type `T`.
pub trait SecondaryKey<T>: 'static {
    /// Key extracted from a record
    type Key: Ord + Clone + Debug + Send + Sync + 'static;

    /// Ordering name, used in errors and in the layout descriptor
    const NAME: &'static str;

    /// Extract the key
    fn key(obj: &T) -> Self::Key;
}

/// Type-erased view of one secondary ordering.
///
/// Records are identified by raw id; the primary table owns the records.
pub trait SecondaryIndex<T>: Send + Sync {
    /// Ordering name
    fn name(&self) -> &'static str;

    /// Id of the live record holding `obj`'s key, if any
    fn holder(&self, obj: &T) -> Option<i64>;

    /// Map `obj`'s key to `id`
    fn insert(&mut self, obj: &T, id: i64);

    /// Drop `obj`'s key if it is mapped to `id`
    fn remove(&mut self, obj: &T, id: i64);

    /// Number of mapped keys
    fn len(&self) -> usize;

    /// Drop every key
    fn clear(&mut self);

    /// Downcast support for typed lookups
    fn as_any(&self) -> &dyn Any;
}

/// Ordered unique map from a [`SecondaryKey`] to record ids.
pub struct UniqueIndex<T, K: SecondaryKey<T>> {
    map: BTreeMap<K::Key, i64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, K: SecondaryKey<T>> UniqueIndex<T, K> {
    /// Create an empty ordering
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            _marker: PhantomData,
        }
    }

    /// Id mapped to `key`
    pub fn get(&self, key: &K::Key) -> Option<i64> {
        self.map.get(key).copied()
    }

    /// Ids in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K::Key, i64)> + '_ {
        self.map.iter().map(|(k, id)| (k, *id))
    }

    /// Ids whose keys fall in `range`, in key order
    pub fn range<'a, R>(&'a self, range: R) -> impl Iterator<Item = (&'a K::Key, i64)> + 'a
    where
        R: RangeBounds<K::Key> + 'a,
    {
        self.map.range(range).map(|(k, id)| (k, *id))
    }
}

impl<T, K: SecondaryKey<T>> Default for UniqueIndex<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, K: SecondaryKey<T>> SecondaryIndex<T> for UniqueIndex<T, K> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn holder(&self, obj: &T) -> Option<i64> {
        self.map.get(&K::key(obj)).copied()
    }

    fn insert(&mut self, obj: &T, id: i64) {
        self.map.insert(K::key(obj), id);
    }

    fn remove(&mut self, obj: &T, id: i64) {
        let key = K::key(obj);
        if self.map.get(&key) == Some(&id) {
            self.map.remove(&key);
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The full set of secondary orderings for one record type.
pub struct SecondaryIndices<T> {
    indices: Vec<Box<dyn SecondaryIndex<T>>>,
}

impl<T: 'static> SecondaryIndices<T> {
    /// No secondary orderings
    pub fn new() -> Self {
        Self {
            indices: Vec::new(),
        }
    }

    /// Add an ordering
    pub fn with<K: SecondaryKey<T>>(mut self) -> Self {
        self.indices.push(Box::new(UniqueIndex::<T, K>::new()));
        self
    }

    /// Typed access to one ordering
    pub fn get<K: SecondaryKey<T>>(&self) -> Option<&UniqueIndex<T, K>> {
        self.indices
            .iter()
            .find_map(|idx| idx.as_any().downcast_ref::<UniqueIndex<T, K>>())
    }

    /// Ordering names in declaration order
    pub fn names(&self) -> Vec<String> {
        self.indices.iter().map(|i| i.name().to_string()).collect()
    }

    /// Number of orderings
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if the type only has its primary ordering
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// First ordering where `obj`'s key is held by a record other than
    /// `ignore`.
    pub fn conflict(&self, obj: &T, ignore: Option<i64>) -> Option<&'static str> {
        self.indices.iter().find_map(|idx| match idx.holder(obj) {
            Some(holder) if Some(holder) != ignore => Some(idx.name()),
            _ => None,
        })
    }

    /// First ordering where `obj`'s key is held by a record for which
    /// `blocks` returns true.
    pub fn conflict_where<F>(&self, obj: &T, blocks: F) -> Option<&'static str>
    where
        F: Fn(i64) -> bool,
    {
        self.indices.iter().find_map(|idx| match idx.holder(obj) {
            Some(holder) if blocks(holder) => Some(idx.name()),
            _ => None,
        })
    }

    /// Map every ordering's key for `obj` to `id`
    pub fn insert(&mut self, obj: &T, id: i64) {
        for idx in &mut self.indices {
            idx.insert(obj, id);
        }
    }

    /// Remove every ordering's key for `obj`
    pub fn remove(&mut self, obj: &T, id: i64) {
        for idx in &mut self.indices {
            idx.remove(obj, id);
        }
    }

    /// Drop every key in every ordering
    pub fn clear(&mut self) {
        for idx in &mut self.indices {
            idx.clear();
        }
    }
}

impl<T: 'static> Default for SecondaryIndices<T> {
    fn default() -> Self {
        Self::new()
    }
}
