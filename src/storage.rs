//! Bucketed uniqueness arena backing the node factories.
//!
//! The arena is a growable list of fixed-size buckets. Each slot holds one node
//! together with its precomputed content hash. Lookup probes up to
//! [`PROBES`] slots per bucket with quadratic (triangular-number) offsets; when
//! every probe in every bucket collides, a fresh bucket is appended. Buckets are
//! never resized or compacted, so a slot address is stable for the lifetime of
//! the arena — which is what makes node handles usable as cache keys elsewhere.

use log::debug;

/// Default number of slots per bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 1024;

/// Number of slots probed per bucket before moving to the next one.
const PROBES: usize = 8;

struct Slot<T> {
    /// Precomputed content hash, checked before the content comparison.
    hash: u64,
    value: T,
}

pub struct Arena<T> {
    buckets: Vec<Box<[Option<Slot<T>>]>>,
    bucket_capacity: usize,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new(bucket_capacity: usize) -> Self {
        assert!(
            bucket_capacity >= PROBES,
            "Bucket capacity should be at least {}",
            PROBES
        );
        Self {
            buckets: Vec::new(),
            bucket_capacity,
            len: 0,
        }
    }

    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }
    /// Number of in-use slots across all buckets.
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> &T {
        let slot = self.buckets[index / self.bucket_capacity][index % self.bucket_capacity]
            .as_ref()
            .expect("arena slot is not occupied");
        &slot.value
    }

    fn grow(&mut self) {
        let bucket: Box<[Option<Slot<T>>]> = (0..self.bucket_capacity).map(|_| None).collect();
        self.buckets.push(bucket);
    }
}

impl<T: Eq> Arena<T> {
    /// Returns the canonical index for `value`, installing it if not yet present.
    ///
    /// `hash` must be a pure function of the content of `value`.
    pub fn put(&mut self, hash: u64, value: T) -> usize {
        let base = (hash % self.bucket_capacity as u64) as usize;

        let mut free = None;
        'scan: for (bi, bucket) in self.buckets.iter().enumerate() {
            for i in 0..PROBES {
                let pos = (base + (i + i * i) / 2) % self.bucket_capacity;
                match &bucket[pos] {
                    Some(slot) => {
                        if slot.hash == hash && slot.value == value {
                            // The node already exists.
                            return bi * self.bucket_capacity + pos;
                        }
                    }
                    None => {
                        // Occupied slots are never vacated, so the first free
                        // probed slot proves the node is not interned yet.
                        free = Some((bi, pos));
                        break 'scan;
                    }
                }
            }
        }

        let (bi, pos) = match free {
            Some(target) => target,
            None => {
                debug!("arena: all probes collided, appending bucket #{}", self.buckets.len());
                self.grow();
                (self.buckets.len() - 1, base)
            }
        };
        self.buckets[bi][pos] = Some(Slot { hash, value });
        self.len += 1;
        bi * self.bucket_capacity + pos
    }
}
