//! A string-keyed hash table with open hashing via chaining-in-array.
//!
//! The table is a fixed-size array of buckets, chosen at construction and
//! never resized; each bucket is itself a [`GrowArray`] of entries and is
//! allocated lazily on first insert. Entries own their key, carry the
//! caller's value, and cache the key's FNV-1a hash so bucket scans can
//! reject non-matches without comparing bytes.

use crate::store::array::GrowArray;

/// Default number of top-level buckets.
pub const DEFAULT_BUCKET_COUNT: usize = 100;

/// Initial slot count of a lazily-created bucket.
const BUCKET_CAPACITY: usize = 8;

/// FNV-1a offset basis.
const FNV_OFFSET_BASIS: u64 = 0x811c_9dc5;

/// FNV-1a prime.
const FNV_PRIME: u64 = 0x0100_0193;

/// Hashes `key` with FNV-1a over its byte sequence.
///
/// The offset basis and multiplier are the 32-bit FNV constants applied in
/// 64-bit wrapping arithmetic; the exact bit pattern is load-bearing for any
/// consumer that compares stored hashes, so tests pin reference values.
#[must_use]
pub fn fnv1a_hash(key: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug)]
struct Entry<V> {
    key: String,
    hash: u64,
    value: V,
}

/// A map from owned `String` keys to values of type `V`.
///
/// An entry lives in exactly one bucket, the one selected by
/// `hash(key) % bucket_count`; within a bucket at most one entry has a given
/// key. Setting an existing key replaces its value (last write wins).
#[derive(Debug)]
pub struct Table<V> {
    buckets: GrowArray<GrowArray<Entry<V>>>,
    bucket_count: usize,
    entries: usize,
}

impl<V> Table<V> {
    /// Creates a table with [`DEFAULT_BUCKET_COUNT`] buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bucket_count(DEFAULT_BUCKET_COUNT)
    }

    /// Creates a table with a fixed number of buckets (at least one).
    #[must_use]
    pub fn with_bucket_count(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: GrowArray::new(bucket_count),
            bucket_count,
            entries: 0,
        }
    }

    /// The number of entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Whether the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// The fixed number of top-level buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    fn bucket_index(&self, hash: u64) -> usize {
        usize::try_from(hash % self.bucket_count as u64).unwrap_or(0)
    }

    /// Stores `value` under `key`, returning the previous value if the key
    /// was already present.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let hash = fnv1a_hash(&key);
        let index = self.bucket_index(hash);

        if self.buckets.get(index).is_none() {
            self.buckets.set(GrowArray::new(BUCKET_CAPACITY), index);
        }
        let Some(bucket) = self.buckets.get_mut(index) else {
            return None;
        };

        for i in 0..bucket.len() {
            if let Some(entry) = bucket.get_mut(i)
                && entry.hash == hash
                && entry.key == key
            {
                return Some(std::mem::replace(&mut entry.value, value));
            }
        }

        bucket.push(Entry { key, hash, value });
        self.entries += 1;
        None
    }

    /// Returns a reference to the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        let hash = fnv1a_hash(key);
        let bucket = self.buckets.get(self.bucket_index(hash))?;

        for entry in bucket.iter() {
            if entry.hash == hash && entry.key == key {
                return Some(&entry.value);
            }
        }
        None
    }

    /// Removes the entry stored under `key` and returns its value.
    ///
    /// The vacated slot is filled by the bucket's last entry (swap-remove),
    /// so removal never shifts the rest of the bucket.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let hash = fnv1a_hash(key);
        let index = self.bucket_index(hash);
        let bucket = self.buckets.get_mut(index)?;

        let mut found = None;
        for i in 0..bucket.len() {
            if let Some(entry) = bucket.get(i)
                && entry.hash == hash
                && entry.key == key
            {
                found = Some(i);
                break;
            }
        }
        let found = found?;

        let last_index = bucket.len() - 1;
        let last = bucket.pop()?;
        self.entries -= 1;
        if found == last_index {
            return Some(last.value);
        }
        bucket.set(last, found).map(|entry| entry.value)
    }

    /// Iterates over every entry, bucket by bucket, in insertion order
    /// within a bucket. The order across buckets is hash-dependent.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|entry| (entry.key.as_str(), &entry.value)))
    }

    /// Invokes `visitor` on every entry, in the same order as [`Table::iter`].
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &V),
    {
        for (key, value) in self.iter() {
            visitor(key, value);
        }
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}
