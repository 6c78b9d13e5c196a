//! Order-sensitive structural hashing with a lazily filled cache.
//!
//! A collection's structural hash combines the hashes of its elements in
//! logical order. It is computed on first request and cached in the handle.
//! The value `0` doubles as "not yet computed", so an empty collection (whose
//! hash is defined as `0`) and the rare collection whose hash happens to be
//! `0` are simply recomputed on every request.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "fxhash")]
type ElementHasher = rustc_hash::FxHasher;

#[cfg(not(feature = "fxhash"))]
type ElementHasher = std::collections::hash_map::DefaultHasher;

const MULTIPLIER: u64 = 31;

/// Hashes one element with the crate's element hasher.
pub(crate) fn element_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = ElementHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Combines element hashes in order. Empty input hashes to `0`.
pub(crate) fn structural_hash<'a, T, I>(elements: I) -> u64
where
    T: Hash + 'a,
    I: IntoIterator<Item = &'a T>,
{
    elements.into_iter().fold(0, |accumulator, element| {
        accumulator.wrapping_mul(MULTIPLIER).wrapping_add(element_hash(element))
    })
}

/// Cached structural hash of one tree version.
///
/// Cloning copies the cached value: clones share the same root and
/// therefore the same hash.
#[derive(Default)]
pub(crate) struct HashCache(AtomicU64);

impl HashCache {
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// The cached hash, if one has been computed.
    pub(crate) fn peek(&self) -> Option<u64> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            hash => Some(hash),
        }
    }

    /// Returns the cached hash, computing and storing it first if needed.
    pub(crate) fn get_or_compute<F>(&self, compute: F) -> u64
    where
        F: FnOnce() -> u64,
    {
        if let Some(hash) = self.peek() {
            return hash;
        }
        let hash = compute();
        self.0.store(hash, Ordering::Relaxed);
        hash
    }
}

impl Clone for HashCache {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.0.load(Ordering::Relaxed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_empty_hash_is_zero() {
        assert_eq!(structural_hash::<i32, _>(&[]), 0);
    }

    #[rstest]
    fn test_hash_is_order_sensitive() {
        assert_ne!(structural_hash(&[1, 2, 3]), structural_hash(&[3, 2, 1]));
        assert_eq!(structural_hash(&[1, 2, 3]), structural_hash(&vec![1, 2, 3]));
    }

    #[rstest]
    fn test_cache_computes_once() {
        let cache = HashCache::new();
        let mut calls = 0;
        assert_eq!(cache.get_or_compute(|| { calls += 1; 42 }), 42);
        assert_eq!(cache.get_or_compute(|| { calls += 1; 7 }), 42);
        assert_eq!(calls, 1);
        assert_eq!(cache.clone().peek(), Some(42));
    }

    #[rstest]
    fn test_zero_is_never_cached() {
        let cache = HashCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            assert_eq!(cache.get_or_compute(|| { calls += 1; 0 }), 0);
        }
        assert_eq!(calls, 3);
        assert_eq!(cache.peek(), None);
    }
}
