//! Persistent (immutable) ordered map based on a count-augmented AVL tree.
//!
//! This module provides [`PersistentSortedMap`], an immutable map whose
//! entries are kept ordered by a [`KeyOrder`] capability chosen at the type
//! level.
//!
//! # Overview
//!
//! - O(log N) `get`, `add`, `add_or_update`, `remove`
//! - O(log N) nearest-neighbour queries (`find_predecessor` and friends)
//! - O(log N) positional access (`get_index`, `index_of_key`, `skip`, `take`)
//! - O(log N + K) lazy range queries over K entries
//! - O(1) `len`, `is_empty` and `reverse`
//!
//! # Examples
//!
//! ```rust
//! use persistent_avl::persistent::PersistentSortedMap;
//!
//! let map: PersistentSortedMap<i32, &str> =
//!     [(1, "a"), (3, "c"), (2, "b")].into_iter().collect();
//! assert_eq!(map.find_range(&1, &2).copied().collect::<Vec<_>>(), vec!["a", "b"]);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.add_or_update(2, "B");
//! assert_eq!(map.get(&2), Some(&"b"));
//! assert_eq!(updated.get(&2), Some(&"B"));
//! ```

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};

use super::ReferenceCounter;
use super::enumerator::{Enumerator, StackPool, TreeIter};
use super::error::{TreeError, TreeResult};
use super::hashing::{HashCache, structural_hash};
use super::keyed::{Conflict, Inserted};
use super::node::Subtree;
use super::order::{KeyOrder, NaturalOrder};

// =============================================================================
// PersistentSortedMap Definition
// =============================================================================

/// A persistent (immutable) map ordered by the key order `O`.
///
/// Keys are considered equal exactly when `O::compare` returns
/// [`Ordering::Equal`]. Cloning is O(1).
///
/// # Time Complexity
///
/// | Operation         | Complexity    |
/// |-------------------|---------------|
/// | `get`             | O(log N)      |
/// | `add`             | O(log N)      |
/// | `remove`          | O(log N)      |
/// | `find_range`      | O(log N + K)  |
/// | `get_index`       | O(log N)      |
/// | `union`           | O(M log N)    |
/// | `union_with`      | O(N + M)      |
/// | `reverse`         | O(1)          |
/// | `len`             | O(1)          |
///
/// # Examples
///
/// ```rust
/// use persistent_avl::persistent::{PersistentSortedMap, TreeError};
///
/// let map: PersistentSortedMap<i32, &str> = PersistentSortedMap::new()
///     .add_or_update(2, "two")
///     .add_or_update(1, "one");
/// assert_eq!(map.to_string(), "{1: one, 2: two}");
/// assert_eq!(map.add(1, "uno"), Err(TreeError::DuplicateKey));
/// ```
pub struct PersistentSortedMap<K, V, O = NaturalOrder> {
    root: Subtree<(K, V)>,
    reversed: bool,
    hash: HashCache,
    pool: ReferenceCounter<StackPool<(K, V)>>,
    order: PhantomData<fn() -> O>,
}

impl<K, V, O> PersistentSortedMap<K, V, O> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, String> = PersistentSortedMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_direction(Subtree::Empty, false)
    }

    fn with_direction(root: Subtree<(K, V)>, reversed: bool) -> Self {
        Self {
            root,
            reversed,
            hash: HashCache::new(),
            pool: ReferenceCounter::new(StackPool::new()),
            order: PhantomData,
        }
    }

    /// New version over `root`, sharing direction and stack pool.
    fn derive(&self, root: Subtree<(K, V)>) -> Self {
        Self {
            root,
            reversed: self.reversed,
            hash: HashCache::new(),
            pool: self.pool.clone(),
            order: PhantomData,
        }
    }

    /// Returns the number of entries.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns `true` if entries are enumerated in descending key order.
    #[inline]
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Entries in ascending key order, whatever the direction.
    fn ascending(&self) -> TreeIter<'_, (K, V)> {
        TreeIter::new(&self.root, 0, self.len(), false)
    }

    /// Logical iterator over the ascending positions `[start, end)`.
    fn window(&self, start: usize, end: usize) -> PersistentSortedMapIterator<'_, K, V> {
        let count = end - start;
        let inner = if self.reversed {
            TreeIter::new(&self.root, self.len() - end, count, true)
        } else {
            TreeIter::new(&self.root, start, count, false)
        };
        PersistentSortedMapIterator { inner }
    }

    /// Returns an iterator over the entries in logical order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, char> = [(2, 'b'), (1, 'a')].into_iter().collect();
    /// let entries: Vec<(&i32, &char)> = map.iter().collect();
    /// assert_eq!(entries, vec![(&1, &'a'), (&2, &'b')]);
    /// ```
    pub fn iter(&self) -> PersistentSortedMapIterator<'_, K, V> {
        self.window(0, self.len())
    }

    /// Returns an iterator over the keys in logical order.
    pub fn keys(&self) -> PersistentSortedMapKeys<'_, K, V> {
        PersistentSortedMapKeys { inner: self.iter() }
    }

    /// Returns an iterator over the values in logical key order.
    pub fn values(&self) -> PersistentSortedMapValues<'_, K, V> {
        PersistentSortedMapValues { inner: self.iter() }
    }

    /// Returns an owning, restartable enumerator over at most `count`
    /// entries starting at logical position `start`.
    pub fn enumerator(&self, start: usize, count: usize) -> Enumerator<(K, V)> {
        Enumerator::new(self.root.clone(), self.pool.clone(), start, count, self.reversed)
    }

    /// Number of idle traversal stacks pooled for this map family.
    #[must_use]
    pub fn pooled_stacks(&self) -> usize {
        self.pool.available()
    }

    /// Returns the same entries enumerated in the opposite order.
    ///
    /// Keyed operations are unaffected; positional ones follow the new
    /// order.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            root: self.root.clone(),
            reversed: !self.reversed,
            hash: HashCache::new(),
            pool: self.pool.clone(),
            order: PhantomData,
        }
    }

    /// Entry with the least key.
    #[must_use]
    pub fn min_entry(&self) -> Option<(&K, &V)> {
        self.root.first().map(|(key, value)| (key, value))
    }

    /// Entry with the greatest key.
    #[must_use]
    pub fn max_entry(&self) -> Option<(&K, &V)> {
        self.root.last().map(|(key, value)| (key, value))
    }

    /// Entry at logical position `index`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, char> = [(10, 'a'), (20, 'b'), (30, 'c')].into_iter().collect();
    /// assert_eq!(map.get_index(1), Some((&20, &'b')));
    /// assert_eq!(map.reverse().get_index(0), Some((&30, &'c')));
    /// assert_eq!(map.get_index(3), None);
    /// ```
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        let length = self.len();
        if index >= length {
            return None;
        }
        let physical = if self.reversed { length - 1 - index } else { index };
        self.root.get_at(physical).map(|(key, value)| (key, value))
    }

    /// Returns `true` if both maps are the same version: same tree, same
    /// direction.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.reversed == other.reversed && self.root.ptr_eq(&other.root)
    }

    /// Number of elements of `self` stored in nodes that `other` shares.
    ///
    /// Direction is ignored. After a single update the result is at least
    /// `len() - O(log N)`.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    ///
    /// # Examples
    ///
    /// ```
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..100).map(|key| (key, key)).collect();
    /// let updated = map.add_or_update(0, -1);
    /// assert_eq!(map.shared_len(&map.reverse()), 100);
    /// assert!(map.shared_len(&updated) > 90);
    /// ```
    #[must_use]
    pub fn shared_len(&self, other: &Self) -> usize {
        self.root.shared_count(&other.root)
    }

    /// Checks the count and AVL balance invariants of every node.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.root.verify().is_some()
    }

    /// Order-sensitive hash of the entries, computed once per version.
    ///
    /// The empty map hashes to `0`.
    pub fn structural_hash(&self) -> u64
    where
        K: Hash,
        V: Hash,
    {
        self.hash.get_or_compute(|| structural_hash(TreeIter::new(&self.root, 0, self.len(), self.reversed)))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns a reference to the value for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<String, i32> = [("one".to_string(), 1)].into_iter().collect();
    /// assert_eq!(map.get("one"), Some(&1));
    /// assert_eq!(map.get("two"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.find_entry::<O, Q>(key).map(|(_, value)| value)
    }

    /// Returns the value for `key`, or `None` when absent. Never fails.
    #[inline]
    pub fn try_find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.get(key)
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::KeyNotFound`] if the key is absent.
    pub fn find<Q>(&self, key: &Q) -> TreeResult<&V>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.get(key).ok_or(TreeError::KeyNotFound)
    }

    /// Returns a clone of the value for `key`, or the result of `default`.
    pub fn find_or_else<Q, F>(&self, key: &Q, default: F) -> V
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
        V: Clone,
        F: FnOnce() -> V,
    {
        self.get(key).cloned().unwrap_or_else(default)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.find_entry::<O, Q>(key).is_some()
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.find_entry::<O, Q>(key).map(|(key, value)| (key, value))
    }

    /// Logical position of `key`.
    pub fn index_of_key<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let position = self.root.position_of::<O, Q>(key)?;
        Some(if self.reversed { self.len() - 1 - position } else { position })
    }

    /// Entry with the greatest key strictly less than `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, ()> = [10, 20, 30].into_iter().map(|key| (key, ())).collect();
    /// assert_eq!(map.find_predecessor(&20).map(|(key, _)| *key), Some(10));
    /// assert_eq!(map.find_or_predecessor(&25).map(|(key, _)| *key), Some(20));
    /// assert_eq!(map.find_successor(&30), None);
    /// ```
    pub fn find_predecessor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.predecessor::<O, Q>(key).map(|(key, value)| (key, value))
    }

    /// Entry with the least key strictly greater than `key`.
    pub fn find_successor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.successor::<O, Q>(key).map(|(key, value)| (key, value))
    }

    /// Entry for `key`, or else its predecessor.
    pub fn find_or_predecessor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.or_predecessor::<O, Q>(key).map(|(key, value)| (key, value))
    }

    /// Entry for `key`, or else its successor.
    pub fn find_or_successor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root.or_successor::<O, Q>(key).map(|(key, value)| (key, value))
    }

    /// Lazily yields the values whose keys lie in `[low, high]`, in logical
    /// order.
    ///
    /// Subtrees entirely outside the bounds are never visited. An inverted
    /// range yields nothing.
    pub fn find_range<Q>(&self, low: &Q, high: &Q) -> PersistentSortedMapValues<'_, K, V>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let (start, end) = self.root.window_of::<O, Q>(Bound::Included(low), Bound::Included(high));
        PersistentSortedMapValues {
            inner: self.window(start, end),
        }
    }

    /// Lazily yields the entries whose keys lie within `range`, in logical
    /// order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..10).map(|key| (key, key * key)).collect();
    /// let squares: Vec<i32> = map.range(3..6).map(|(_, value)| *value).collect();
    /// assert_eq!(squares, vec![9, 16, 25]);
    /// ```
    pub fn range<Q, R>(&self, range: R) -> PersistentSortedMapIterator<'_, K, V>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        let (start, end) = self.root.window_of::<O, Q>(range.start_bound(), range.end_bound());
        self.window(start, end)
    }
}

impl<K: Clone, V: Clone, O: KeyOrder<K>> PersistentSortedMap<K, V, O> {
    /// Creates a map containing a single entry.
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::with_direction(Subtree::leaf((key, value)), false)
    }

    /// Builds a perfectly balanced map from entries already in strictly
    /// ascending key order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnsortedInput`] at the first key that does not
    /// strictly follow its predecessor.
    ///
    /// # Complexity
    ///
    /// O(N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::{PersistentSortedMap, TreeError};
    ///
    /// let map = PersistentSortedMap::<i32, char>::from_sorted([(1, 'a'), (2, 'b')]).unwrap();
    /// assert_eq!(map.len(), 2);
    ///
    /// let unsorted = PersistentSortedMap::<i32, char>::from_sorted([(2, 'b'), (1, 'a')]);
    /// assert_eq!(unsorted.unwrap_err(), TreeError::UnsortedInput { position: 1 });
    /// ```
    pub fn from_sorted<I>(entries: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        if let Some(position) = entries
            .windows(2)
            .position(|pair| O::compare(&pair[0].0, &pair[1].0) != Ordering::Less)
        {
            return Err(TreeError::UnsortedInput { position: position + 1 });
        }
        Ok(Self::with_direction(Subtree::from_ordered(entries), false))
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Adds an entry for a key that must not be present yet.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateKey`] if the key is present; the map is
    /// unchanged.
    pub fn add(&self, key: K, value: V) -> TreeResult<Self> {
        match self.root.insert_entry::<O>(key, value, Conflict::Keep) {
            Inserted::Added(root) => Ok(self.derive(root)),
            Inserted::Replaced(_) | Inserted::Existing => Err(TreeError::DuplicateKey),
        }
    }

    /// Adds an entry unless the key is present, in which case the same
    /// version is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, &str> = PersistentSortedMap::singleton(1, "one");
    /// assert!(map.try_add(1, "uno").ptr_eq(&map));
    /// assert_eq!(map.try_add(2, "two").len(), 2);
    /// ```
    #[must_use]
    pub fn try_add(&self, key: K, value: V) -> Self {
        match self.root.insert_entry::<O>(key, value, Conflict::Keep) {
            Inserted::Added(root) => self.derive(root),
            Inserted::Replaced(_) | Inserted::Existing => self.clone(),
        }
    }

    /// Adds an entry, replacing the value if the key is present.
    ///
    /// Replacing keeps the stored key and the tree shape.
    #[must_use]
    pub fn add_or_update(&self, key: K, value: V) -> Self {
        match self.root.insert_entry::<O>(key, value, Conflict::Replace) {
            Inserted::Added(root) | Inserted::Replaced(root) => self.derive(root),
            Inserted::Existing => self.clone(),
        }
    }

    /// Replaces the value of a key that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::KeyNotFound`] if the key is absent.
    pub fn set_item<Q>(&self, key: &Q, value: V) -> TreeResult<Self>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root
            .replace_value::<O, Q>(key, value)
            .map(|root| self.derive(root))
            .ok_or(TreeError::KeyNotFound)
    }

    /// Replaces the value of `key` if present; otherwise returns the same
    /// version.
    #[must_use]
    pub fn try_set_item<Q>(&self, key: &Q, value: V) -> Self
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.set_item(key, value).unwrap_or_else(|_| self.clone())
    }

    /// Adds every entry with [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateKey`] at the first key already present
    /// (in the map or earlier in `entries`); the map is unchanged.
    pub fn add_range<I>(&self, entries: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .try_fold(self.clone(), |map, (key, value)| map.add(key, value))
    }

    /// Adds every entry with [`try_add`](Self::try_add).
    #[must_use]
    pub fn try_add_range<I>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .fold(self.clone(), |map, (key, value)| map.try_add(key, value))
    }

    /// Adds every entry with [`add_or_update`](Self::add_or_update).
    #[must_use]
    pub fn add_or_update_range<I>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .fold(self.clone(), |map, (key, value)| map.add_or_update(key, value))
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes `key`. Removing an absent key returns the same version.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..5).map(|key| (key, key)).collect();
    /// assert_eq!(map.remove(&2).len(), 4);
    /// assert!(map.remove(&9).ptr_eq(&map));
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.root
            .remove_entry::<O, Q>(key)
            .map_or_else(|| self.clone(), |root| self.derive(root))
    }

    /// Removes every key in `keys`, skipping absent ones.
    #[must_use]
    pub fn remove_range<'a, Q, I>(&self, keys: I) -> Self
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        keys.into_iter().fold(self.clone(), |map, key| map.remove(key))
    }

    // =========================================================================
    // Positional Slicing
    // =========================================================================

    /// Drops the first `amount` entries in logical order.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn skip(&self, amount: usize) -> Self {
        let amount = amount.min(self.len());
        if self.reversed {
            self.derive(self.root.take(self.len() - amount))
        } else {
            self.derive(self.root.skip(amount))
        }
    }

    /// Keeps only the first `amount` entries in logical order.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn take(&self, amount: usize) -> Self {
        let amount = amount.min(self.len());
        if self.reversed {
            self.derive(self.root.skip(self.len() - amount))
        } else {
            self.derive(self.root.take(amount))
        }
    }

    // =========================================================================
    // Transformation
    // =========================================================================

    /// Keeps the entries satisfying `predicate`.
    #[must_use]
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&K, &V) -> bool,
    {
        let kept: Vec<(K, V)> = self
            .ascending()
            .filter(|(key, value)| predicate(key, value))
            .cloned()
            .collect();
        self.derive(Subtree::from_ordered(kept))
    }

    /// Applies `function` to every value, keeping keys and direction.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = [(1, 10), (2, 20)].into_iter().collect();
    /// let doubled = map.map_values(|value| value * 2);
    /// assert_eq!(doubled.get(&2), Some(&40));
    /// ```
    #[must_use]
    pub fn map_values<W, F>(&self, mut function: F) -> PersistentSortedMap<K, W, O>
    where
        W: Clone,
        F: FnMut(&V) -> W,
    {
        let mapped: Vec<(K, W)> = self
            .ascending()
            .map(|(key, value)| (key.clone(), function(value)))
            .collect();
        PersistentSortedMap::with_direction(Subtree::from_ordered(mapped), self.reversed)
    }

    // =========================================================================
    // Set Algebra
    // =========================================================================

    /// Merges two maps key by key.
    ///
    /// Each key present only on the left is passed to `left_only`, only on
    /// the right to `right_only`, and on both sides to `both`. A callback
    /// returning `None` drops the key from the result. The result keeps this
    /// map's direction.
    ///
    /// # Complexity
    ///
    /// O(N + M): a single merge of the two ascending enumerations followed by
    /// a balanced O(N + M) build.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let left: PersistentSortedMap<i32, i32> = [(1, 1), (2, 2)].into_iter().collect();
    /// let right: PersistentSortedMap<i32, i32> = [(2, 20), (3, 30)].into_iter().collect();
    /// let summed = left.union_with(
    ///     &right,
    ///     |_, value| Some(*value),
    ///     |_, value| Some(*value),
    ///     |_, left, right| Some(left + right),
    /// );
    /// assert_eq!(summed.values().copied().collect::<Vec<_>>(), vec![1, 22, 30]);
    /// ```
    pub fn union_with<W, R, FL, FR, FB>(
        &self,
        other: &PersistentSortedMap<K, W, O>,
        mut left_only: FL,
        mut right_only: FR,
        mut both: FB,
    ) -> PersistentSortedMap<K, R, O>
    where
        R: Clone,
        FL: FnMut(&K, &V) -> Option<R>,
        FR: FnMut(&K, &W) -> Option<R>,
        FB: FnMut(&K, &V, &W) -> Option<R>,
    {
        let mut left = self.ascending().peekable();
        let mut right = other.ascending().peekable();
        let mut merged: Vec<(K, R)> = Vec::with_capacity(self.len().max(other.len()));
        loop {
            let ordering = match (left.peek(), right.peek()) {
                (Some(left_entry), Some(right_entry)) => O::compare(&left_entry.0, &right_entry.0),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            let entry = match ordering {
                Ordering::Less => left
                    .next()
                    .and_then(|(key, value)| left_only(key, value).map(|result| (key.clone(), result))),
                Ordering::Greater => right
                    .next()
                    .and_then(|(key, value)| right_only(key, value).map(|result| (key.clone(), result))),
                Ordering::Equal => match (left.next(), right.next()) {
                    (Some((key, left_value)), Some((_, right_value))) => {
                        both(key, left_value, right_value).map(|result| (key.clone(), result))
                    }
                    _ => None,
                },
            };
            merged.extend(entry);
        }
        PersistentSortedMap::with_direction(Subtree::from_ordered(merged), self.reversed)
    }

    /// Keeps the keys present in both maps, combining their values with
    /// `merge`.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    pub fn intersect_with<W, R, F>(
        &self,
        other: &PersistentSortedMap<K, W, O>,
        mut merge: F,
    ) -> PersistentSortedMap<K, R, O>
    where
        R: Clone,
        F: FnMut(&K, &V, &W) -> R,
    {
        self.union_with(
            other,
            |_, _| None,
            |_, _| None,
            |key, left, right| Some(merge(key, left, right)),
        )
    }

    /// Entries of both maps; on shared keys the value from `other` wins.
    ///
    /// The smaller map's entries are added one by one into the larger map's
    /// tree, so most of the larger tree stays shared.
    ///
    /// # Complexity
    ///
    /// O(M log N) with M the smaller size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSortedMap;
    ///
    /// let left: PersistentSortedMap<i32, &str> = [(1, "a"), (2, "b")].into_iter().collect();
    /// let right: PersistentSortedMap<i32, &str> = [(2, "B"), (3, "c")].into_iter().collect();
    /// assert_eq!(left.union(&right).to_string(), "{1: a, 2: B, 3: c}");
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let root = if other.len() <= self.len() {
            other.ascending().fold(self.root.clone(), |root, (key, value)| {
                match root.insert_entry::<O>(key.clone(), value.clone(), Conflict::Replace) {
                    Inserted::Added(updated) | Inserted::Replaced(updated) => updated,
                    Inserted::Existing => root,
                }
            })
        } else {
            self.ascending().fold(other.root.clone(), |root, (key, value)| {
                match root.insert_entry::<O>(key.clone(), value.clone(), Conflict::Keep) {
                    Inserted::Added(updated) => updated,
                    Inserted::Replaced(_) | Inserted::Existing => root,
                }
            })
        };
        self.derive(root)
    }

    /// Entries of this map whose keys are also in `other`.
    ///
    /// # Complexity
    ///
    /// O(M log N) with M the smaller size.
    #[must_use]
    pub fn intersect<W>(&self, other: &PersistentSortedMap<K, W, O>) -> Self {
        let kept: Vec<(K, V)> = if self.len() <= other.len() {
            self.ascending()
                .filter(|(key, _)| other.contains_key(key))
                .cloned()
                .collect()
        } else {
            other
                .ascending()
                .filter_map(|(key, _)| self.root.find_entry::<O, K>(key).cloned())
                .collect()
        };
        self.derive(Subtree::from_ordered(kept))
    }

    /// Entries of this map whose keys are not in `other`.
    ///
    /// # Complexity
    ///
    /// O(M log N) with M the smaller size.
    #[must_use]
    pub fn except<W>(&self, other: &PersistentSortedMap<K, W, O>) -> Self {
        if other.len() < self.len() {
            let root = other.ascending().fold(self.root.clone(), |root, (key, _)| {
                root.remove_entry::<O, K>(key).unwrap_or(root)
            });
            self.derive(root)
        } else {
            let kept: Vec<(K, V)> = self
                .ascending()
                .filter(|(key, _)| !other.contains_key(key))
                .cloned()
                .collect();
            self.derive(Subtree::from_ordered(kept))
        }
    }

    /// Entries whose keys are in exactly one of the two maps.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    #[must_use]
    pub fn symmetric_except(&self, other: &Self) -> Self {
        let merged = self.union_with(
            other,
            |_, value| Some(value.clone()),
            |_, value| Some(value.clone()),
            |_, _, _| None,
        );
        self.derive(merged.root)
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the entries of a [`PersistentSortedMap`].
pub struct PersistentSortedMapIterator<'a, K, V> {
    inner: TreeIter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for PersistentSortedMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapIterator<'_, K, V> {}

impl<K, V> FusedIterator for PersistentSortedMapIterator<'_, K, V> {}

impl<K, V> Clone for PersistentSortedMapIterator<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// An iterator over the keys of a [`PersistentSortedMap`].
pub struct PersistentSortedMapKeys<'a, K, V> {
    inner: PersistentSortedMapIterator<'a, K, V>,
}

impl<'a, K, V> Iterator for PersistentSortedMapKeys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapKeys<'_, K, V> {}

impl<K, V> FusedIterator for PersistentSortedMapKeys<'_, K, V> {}

/// An iterator over the values of a [`PersistentSortedMap`].
pub struct PersistentSortedMapValues<'a, K, V> {
    inner: PersistentSortedMapIterator<'a, K, V>,
}

impl<'a, K, V> Iterator for PersistentSortedMapValues<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapValues<'_, K, V> {}

impl<K, V> FusedIterator for PersistentSortedMapValues<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, O> Default for PersistentSortedMap<K, V, O> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, O> Clone for PersistentSortedMap<K, V, O> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            reversed: self.reversed,
            hash: self.hash.clone(),
            pool: self.pool.clone(),
            order: PhantomData,
        }
    }
}

/// Collects entries in any order. When a key repeats, the last value wins.
///
/// The entries are sorted once and the tree is built in O(N) from the
/// sorted run.
impl<K: Clone, V: Clone, O: KeyOrder<K>> FromIterator<(K, V)> for PersistentSortedMap<K, V, O> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries: Vec<(K, V)> = iter.into_iter().collect();
        entries.sort_by(|left, right| O::compare(&left.0, &right.0));
        let mut unique: Vec<(K, V)> = Vec::with_capacity(entries.len());
        for entry in entries {
            match unique.last_mut() {
                Some(last) if O::compare(&last.0, &entry.0) == Ordering::Equal => *last = entry,
                _ => unique.push(entry),
            }
        }
        Self::with_direction(Subtree::from_ordered(unique), false)
    }
}

impl<K: Clone, V: Clone, O> IntoIterator for PersistentSortedMap<K, V, O> {
    type Item = (K, V);
    type IntoIter = Enumerator<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.enumerator(0, self.len())
    }
}

impl<'a, K, V, O> IntoIterator for &'a PersistentSortedMap<K, V, O> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentSortedMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V: PartialEq, O: KeyOrder<K>> PartialEq for PersistentSortedMap<K, V, O> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }
        if let (Some(left), Some(right)) = (self.hash.peek(), other.hash.peek())
            && left != right
        {
            return false;
        }
        self.iter().zip(other.iter()).all(|((left_key, left_value), (right_key, right_value))| {
            O::compare(left_key, right_key) == Ordering::Equal && left_value == right_value
        })
    }
}

impl<K, V: Eq, O: KeyOrder<K>> Eq for PersistentSortedMap<K, V, O> {}

impl<K, V: PartialOrd, O: KeyOrder<K>> PartialOrd for PersistentSortedMap<K, V, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        for ((left_key, left_value), (right_key, right_value)) in self.iter().zip(other.iter()) {
            match O::compare(left_key, right_key) {
                Ordering::Equal => {}
                ordering => return Some(ordering),
            }
            match left_value.partial_cmp(right_value) {
                Some(Ordering::Equal) => {}
                ordering => return ordering,
            }
        }
        Some(self.len().cmp(&other.len()))
    }
}

impl<K, V: Ord, O: KeyOrder<K>> Ord for PersistentSortedMap<K, V, O> {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((left_key, left_value), (right_key, right_value)) in self.iter().zip(other.iter()) {
            let ordering = O::compare(left_key, right_key).then_with(|| left_value.cmp(right_value));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.len().cmp(&other.len())
    }
}

/// Hashes the length and the cached structural hash of the entries in
/// logical order. Equal maps produce equal hashes.
impl<K: Hash, V: Hash, O> Hash for PersistentSortedMap<K, V, O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        self.structural_hash().hash(state);
    }
}

impl<K: fmt::Debug, V: fmt::Debug, O> fmt::Debug for PersistentSortedMap<K, V, O> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, O> fmt::Display for PersistentSortedMap<K, V, O> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, O> serde::Serialize for PersistentSortedMap<K, V, O>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentSortedMapVisitor<K, V, O> {
    marker: PhantomData<fn() -> (K, V, O)>,
}

#[cfg(feature = "serde")]
impl<K, V, O> PersistentSortedMapVisitor<K, V, O> {
    const fn new() -> Self {
        Self { marker: PhantomData }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, O> serde::de::Visitor<'de> for PersistentSortedMapVisitor<K, V, O>
where
    K: serde::Deserialize<'de> + Clone,
    V: serde::Deserialize<'de> + Clone,
    O: KeyOrder<K>,
{
    type Value = PersistentSortedMap<K, V, O>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        const MAX_PREALLOCATE: usize = 4096;
        let capacity = access.size_hint().unwrap_or(0).min(MAX_PREALLOCATE);
        let mut entries = Vec::with_capacity(capacity);
        while let Some(entry) = access.next_entry()? {
            entries.push(entry);
        }
        Ok(entries.into_iter().collect())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, O> serde::Deserialize<'de> for PersistentSortedMap<K, V, O>
where
    K: serde::Deserialize<'de> + Clone,
    V: serde::Deserialize<'de> + Clone,
    O: KeyOrder<K>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentSortedMapVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests
// =============================================================================


// =============================================================================
// Serde Tests
// =============================================================================
