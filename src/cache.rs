//! Memoization caches backing the family algebra and the morphism layer.
//!
//! Every recursive operation keeps its own cache, keyed by the operand handles.
//! Because handles are canonical, a hit is a guaranteed semantic match. The
//! cache is a thin wrapper around `hashbrown::HashMap` with two twists:
//!
//! - keys are hashed through [`MyHash`], so the precomputed pairing-function
//!   hash of a handle tuple drives the probe directly;
//! - hit/miss counters are kept in `Cell`s, so lookups work through `&self`.

use std::cell::Cell;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use hashbrown::HashMap;

use crate::reference::Ref;
use crate::utils::MyHash;

/// A hasher that passes through a value precomputed by [`MyHash`].
#[derive(Default)]
pub struct MyHasher {
    hash: u64,
}

impl Hasher for MyHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    #[inline]
    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("MyHasher only supports write_u64")
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Wrapper that implements `std::hash::Hash` for any [`MyHash`] type.
#[derive(Clone, PartialEq, Eq)]
#[repr(transparent)]
struct HashableKey<K>(K);

impl<K: MyHash> Hash for HashableKey<K> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash());
    }
}

/// Hit/miss counters of one cache, as reported by `cache_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// A memoization table keyed through [`MyHash`].
pub struct HashMapCache<K, V> {
    map: HashMap<HashableKey<K>, V, BuildHasherDefault<MyHasher>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<K, V> Default for HashMapCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HashMapCache<K, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::default(),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, BuildHasherDefault::default()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            entries: self.len(),
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<K, V> HashMapCache<K, V>
where
    K: MyHash + Eq,
{
    /// Looks up a key in the cache.
    ///
    /// Uses the `raw_entry` API to avoid cloning the key.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = key.hash();
        match self.map.raw_entry().from_hash(hash, |k| k.0 == *key).map(|(_, v)| v) {
            Some(v) => {
                self.hits.set(self.hits.get() + 1);
                Some(v)
            }
            None => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    /// Inserts a key-value pair into the cache.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        let hash = key.hash();
        self.map
            .raw_entry_mut()
            .from_hash(hash, |k| k.0 == key)
            .insert(HashableKey(key), value);
    }
}

/// Cache over ordered (or handle-sorted, for commutative operations) pairs.
pub type OpCache = HashMapCache<(Ref, Ref), Ref>;
/// Cache over canonicalized operand lists for the n-ary operations.
pub type OpsCache = HashMapCache<Vec<Ref>, Ref>;
/// Per-morphism application cache.
pub type HomCache = HashMapCache<Ref, Ref>;
