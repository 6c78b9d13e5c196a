//! Persistent (immutable) indexed sequence based on a count-augmented AVL tree.
//!
//! This module provides [`PersistentSeq`], an immutable list addressed by
//! position.
//!
//! # Overview
//!
//! Every node stores the number of elements beneath it, so positional
//! lookup, insertion and removal descend in O(log N). Updates copy only the
//! path from the root to the affected position and share every other
//! subtree with the previous version.
//!
//! - O(log N) `get`, `insert`, `remove_at`, `set_item`
//! - O(log N + log M) `insert_range` and `append` of a pre-built sequence
//! - O(log N) `skip`, `take` and `remove_range`
//! - O(1) `len`, `is_empty` and `reverse`
//! - O(N) construction from an iterator
//!
//! # Examples
//!
//! ```rust
//! use persistent_avl::persistent::PersistentSeq;
//!
//! let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
//! assert_eq!(sequence.get(2), Some(&30));
//!
//! let inserted = sequence.insert(2, 99).unwrap();
//! assert_eq!(inserted.iter().copied().collect::<Vec<_>>(), vec![10, 20, 99, 30, 40, 50]);
//!
//! // Structural sharing: the original sequence is preserved
//! assert_eq!(sequence.len(), 5);
//! assert_eq!(inserted.len(), 6);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;

use super::ReferenceCounter;
use super::enumerator::{Enumerator, StackPool, TreeIter};
use super::error::{TreeError, TreeResult};
use super::hashing::{HashCache, structural_hash};
use super::node::Subtree;

// =============================================================================
// PersistentSeq Definition
// =============================================================================

/// A persistent (immutable) sequence addressed by position.
///
/// Cloning is O(1). A sequence may be logically reversed in O(1): the
/// physical tree is shared and every positional operation translates
/// logical positions on the way in and out.
///
/// # Time Complexity
///
/// | Operation      | Complexity           |
/// |----------------|----------------------|
/// | `get`          | O(log N)             |
/// | `insert`       | O(log N)             |
/// | `remove_at`    | O(log N)             |
/// | `set_item`     | O(log N)             |
/// | `insert_range` | O(M + log N)         |
/// | `append`       | O(log N + log M)     |
/// | `skip`/`take`  | O(log N)             |
/// | `search`       | O(log N)             |
/// | `reverse`      | O(1)                 |
/// | `len`          | O(1)                 |
///
/// # Examples
///
/// ```rust
/// use persistent_avl::persistent::PersistentSeq;
///
/// let sequence = PersistentSeq::new().push_back(2).push_back(3).push_front(1);
/// assert_eq!(sequence.to_string(), "[1, 2, 3]");
/// assert_eq!(sequence.reverse().to_string(), "[3, 2, 1]");
/// ```
pub struct PersistentSeq<T> {
    root: Subtree<T>,
    reversed: bool,
    hash: HashCache,
    pool: ReferenceCounter<StackPool<T>>,
}

/// Borrowing iterator over a [`PersistentSeq`].
pub type PersistentSeqIterator<'a, T> = TreeIter<'a, T>;

impl<T> PersistentSeq<T> {
    /// Creates a new empty sequence.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = PersistentSeq::new();
    /// assert!(sequence.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::from_root(Subtree::Empty)
    }

    fn from_root(root: Subtree<T>) -> Self {
        Self {
            root,
            reversed: false,
            hash: HashCache::new(),
            pool: ReferenceCounter::new(StackPool::new()),
        }
    }

    /// New version over `root`, sharing direction and stack pool.
    fn derive(&self, root: Subtree<T>) -> Self {
        Self {
            root,
            reversed: self.reversed,
            hash: HashCache::new(),
            pool: self.pool.clone(),
        }
    }

    /// Returns the number of elements.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// Returns `true` if the sequence contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns `true` if the logical order runs opposite to the physical
    /// tree.
    #[inline]
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Maps a logical position in `[0, len)` to a physical one.
    #[inline]
    fn physical(&self, index: usize) -> usize {
        if self.reversed { self.len() - 1 - index } else { index }
    }

    /// Maps a logical insertion point in `[0, len]` to a physical one.
    #[inline]
    fn physical_gap(&self, index: usize) -> usize {
        if self.reversed { self.len() - index } else { index }
    }

    /// Returns a reference to the element at `index`, or `None` if out of
    /// bounds.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = (1..=5).collect();
    /// assert_eq!(sequence.get(0), Some(&1));
    /// assert_eq!(sequence.get(10), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.root.get_at(self.physical(index))
    }

    /// Returns the first element in logical order.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        if self.reversed { self.root.last() } else { self.root.first() }
    }

    /// Returns the last element in logical order.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        if self.reversed { self.root.first() } else { self.root.last() }
    }

    /// Returns the same elements in the opposite order.
    ///
    /// The tree is shared; only the direction flag changes.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = (1..=3).collect();
    /// let reversed = sequence.reverse();
    /// assert_eq!(reversed.get(0), Some(&3));
    /// assert_eq!(reversed.reverse(), sequence);
    /// ```
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            root: self.root.clone(),
            reversed: !self.reversed,
            hash: HashCache::new(),
            pool: self.pool.clone(),
        }
    }

    /// Returns an iterator over the elements in logical order.
    pub fn iter(&self) -> PersistentSeqIterator<'_, T> {
        TreeIter::new(&self.root, 0, self.len(), self.reversed)
    }

    /// Returns an iterator over at most `count` elements starting at
    /// `start`. The window is clipped to the sequence.
    ///
    /// Positioning costs O(log N), not O(start).
    pub fn iter_window(&self, start: usize, count: usize) -> PersistentSeqIterator<'_, T> {
        TreeIter::new(&self.root, start, count, self.reversed)
    }

    /// Returns a lazy iterator over exactly the elements at positions
    /// `[start, start + count)`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RangeOutOfBounds`] if the window extends past
    /// the end.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
    /// let window: Vec<i32> = sequence.find_range(2, 2).unwrap().copied().collect();
    /// assert_eq!(window, vec![30, 40]);
    /// assert!(sequence.find_range(4, 2).is_err());
    /// ```
    pub fn find_range(&self, start: usize, count: usize) -> TreeResult<PersistentSeqIterator<'_, T>> {
        TreeError::check_window(start, count, self.len())?;
        Ok(self.iter_window(start, count))
    }

    /// Returns an owning, restartable enumerator over at most `count`
    /// elements starting at `start`.
    ///
    /// The enumerator keeps this version alive and borrows its traversal
    /// stack from a pool shared by every version derived from the same
    /// sequence.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
    /// let mut enumerator = sequence.enumerator(2, 2);
    /// assert_eq!(enumerator.by_ref().collect::<Vec<_>>(), vec![30, 40]);
    /// enumerator.reset(0);
    /// assert_eq!(enumerator.collect::<Vec<_>>(), vec![10, 20]);
    /// ```
    pub fn enumerator(&self, start: usize, count: usize) -> Enumerator<T> {
        Enumerator::new(self.root.clone(), self.pool.clone(), start, count, self.reversed)
    }

    /// Number of idle traversal stacks pooled for this sequence family.
    #[must_use]
    pub fn pooled_stacks(&self) -> usize {
        self.pool.available()
    }

    /// Binary search within the logical window `[start, start + count)`.
    ///
    /// `compare` orders an element against the sought value; the window
    /// must be sorted consistently with it. The outer result reports an
    /// invalid window; the inner one is `Ok(index)` of a match or
    /// `Err(index)` of the position where the value would be inserted to
    /// keep the window sorted.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RangeOutOfBounds`] if the window extends past
    /// the end.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
    /// assert_eq!(sequence.search_by(0, 5, |element| element.cmp(&40)), Ok(Ok(3)));
    /// assert_eq!(sequence.search_by(0, 5, |element| element.cmp(&35)), Ok(Err(3)));
    /// ```
    pub fn search_by<F>(&self, start: usize, count: usize, mut compare: F) -> TreeResult<Result<usize, usize>>
    where
        F: FnMut(&T) -> Ordering,
    {
        let length = self.len();
        TreeError::check_window(start, count, length)?;
        if self.reversed {
            let physical_start = length - start - count;
            let found = self
                .root
                .search_window(physical_start, physical_start + count, |element| compare(element).reverse());
            Ok(found.map(|position| length - 1 - position).map_err(|gap| length - gap))
        } else {
            Ok(self.root.search_window(start, start + count, compare))
        }
    }

    /// Binary search for `value` within `[start, start + count)` using a
    /// comparer over two elements.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RangeOutOfBounds`] if the window extends past
    /// the end.
    pub fn search<F>(&self, value: &T, start: usize, count: usize, mut comparer: F) -> TreeResult<Result<usize, usize>>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.search_by(start, count, |element| comparer(element, value))
    }

    /// Binary search for `value` over the whole sequence by [`Ord`].
    pub fn binary_search(&self, value: &T) -> Result<usize, usize>
    where
        T: Ord,
    {
        self.search_by(0, self.len(), |element| element.cmp(value))
            .unwrap_or(Err(0))
    }

    /// Position of the first element equal to `value`.
    ///
    /// # Complexity
    ///
    /// O(N)
    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter().position(|element| element == value)
    }

    /// Order-sensitive hash of the elements, computed once per version.
    ///
    /// The empty sequence hashes to `0`.
    pub fn structural_hash(&self) -> u64
    where
        T: Hash,
    {
        self.hash.get_or_compute(|| structural_hash(self.iter()))
    }

    /// Returns `true` if both sequences are the same version: same tree,
    /// same direction.
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
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = (0..100).collect();
    /// let updated = sequence.set_item(0, -1).unwrap();
    /// assert_eq!(sequence.shared_len(&sequence.clone()), 100);
    /// assert!(sequence.shared_len(&updated) > 90);
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
}

impl<T: Clone> PersistentSeq<T> {
    /// Creates a sequence containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence = PersistentSeq::singleton(42);
    /// assert_eq!(sequence.len(), 1);
    /// assert_eq!(sequence.get(0), Some(&42));
    /// ```
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::from_root(Subtree::leaf(element))
    }

    /// Builds a perfectly balanced sequence holding `elements` in order.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn from_ordered<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_root(Subtree::from_ordered(elements.into_iter().collect()))
    }

    /// Physical subtree holding `elements` in this sequence's direction.
    fn oriented<I>(&self, elements: I) -> Subtree<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut elements: Vec<T> = elements.into_iter().collect();
        if self.reversed {
            elements.reverse();
        }
        Subtree::from_ordered(elements)
    }

    /// Appends an element at the end.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence = PersistentSeq::new().push_back(1).push_back(2);
    /// assert_eq!(sequence.last(), Some(&2));
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        self.derive(self.root.insert_at(self.physical_gap(self.len()), element))
    }

    /// Prepends an element at the front.
    #[must_use]
    pub fn push_front(&self, element: T) -> Self {
        self.derive(self.root.insert_at(self.physical_gap(0), element))
    }

    /// Inserts `element` so that it lands at `index`.
    ///
    /// `index` may equal `len()` to append.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InsertOutOfRange`] if `index > len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::{PersistentSeq, TreeError};
    ///
    /// let sequence: PersistentSeq<i32> = (0..3).collect();
    /// assert_eq!(sequence.insert(3, 3).unwrap().len(), 4);
    /// assert_eq!(
    ///     sequence.insert(5, 5),
    ///     Err(TreeError::InsertOutOfRange { index: 5, length: 3 })
    /// );
    /// ```
    pub fn insert(&self, index: usize, element: T) -> TreeResult<Self> {
        TreeError::check_insert(index, self.len())?;
        Ok(self.derive(self.root.insert_at(self.physical_gap(index), element)))
    }

    /// Inserts every element of `elements`, in order, starting at `index`.
    ///
    /// The new elements are built into a balanced subtree first and spliced
    /// in with a single join.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InsertOutOfRange`] if `index > len()`.
    pub fn insert_range<I>(&self, index: usize, elements: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = T>,
    {
        TreeError::check_insert(index, self.len())?;
        let inserted = self.oriented(elements);
        Ok(self.derive(self.root.insert_tree_at(self.physical_gap(index), &inserted)))
    }

    /// Appends every element of `other` after the elements of `self`.
    ///
    /// When both sequences run in the same direction `other`'s tree is
    /// spliced in whole and stays shared.
    ///
    /// # Complexity
    ///
    /// O(log N + log M) in the same direction, O(M) otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let left: PersistentSeq<i32> = (0..3).collect();
    /// let right: PersistentSeq<i32> = (3..6).collect();
    /// assert_eq!(left.append(&right), (0..6).collect::<PersistentSeq<i32>>());
    /// ```
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        let tail = if other.reversed == self.reversed {
            other.root.clone()
        } else {
            self.oriented(other.iter().cloned())
        };
        if self.reversed {
            self.derive(Subtree::concat(tail, self.root.clone()))
        } else {
            self.derive(Subtree::concat(self.root.clone(), tail))
        }
    }

    /// Removes the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfRange`] if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = [10, 20, 30].into_iter().collect();
    /// let removed = sequence.remove_at(0).unwrap();
    /// assert_eq!(removed.iter().copied().collect::<Vec<_>>(), vec![20, 30]);
    /// ```
    pub fn remove_at(&self, index: usize) -> TreeResult<Self> {
        TreeError::check_index(index, self.len())?;
        Ok(self.derive(self.root.remove_at(self.physical(index))))
    }

    /// Removes `count` elements starting at `start`.
    ///
    /// Removing an empty window returns the same version.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RangeOutOfBounds`] if the window extends past
    /// the end.
    pub fn remove_range(&self, start: usize, count: usize) -> TreeResult<Self> {
        let length = self.len();
        TreeError::check_window(start, count, length)?;
        if count == 0 {
            return Ok(self.clone());
        }
        let physical_start = if self.reversed { length - start - count } else { start };
        Ok(self.derive(self.root.remove_window(physical_start, count)))
    }

    /// Replaces the element at `index`.
    ///
    /// The tree shape is unchanged; only the path to `index` is copied.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfRange`] if `index >= len()`.
    pub fn set_item(&self, index: usize, element: T) -> TreeResult<Self> {
        TreeError::check_index(index, self.len())?;
        Ok(self.derive(self.root.set_at(self.physical(index), element)))
    }

    /// Replaces the element at `index` with `function` applied to it.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfRange`] if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = (1..=3).collect();
    /// let doubled = sequence.update(1, |element| element * 10).unwrap();
    /// assert_eq!(doubled.get(1), Some(&20));
    /// ```
    pub fn update<F>(&self, index: usize, function: F) -> TreeResult<Self>
    where
        F: FnOnce(&T) -> T,
    {
        let length = self.len();
        let current = self.get(index).ok_or(TreeError::IndexOutOfRange { index, length })?;
        Ok(self.derive(self.root.set_at(self.physical(index), function(current))))
    }

    /// Drops the first `amount` elements.
    ///
    /// # Complexity
    ///
    /// O(log N): whole subtrees are discarded and the remainders joined.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_avl::persistent::PersistentSeq;
    ///
    /// let sequence: PersistentSeq<i32> = (0..10).collect();
    /// assert_eq!(sequence.skip(7), (7..10).collect::<PersistentSeq<i32>>());
    /// assert!(sequence.skip(20).is_empty());
    /// ```
    #[must_use]
    pub fn skip(&self, amount: usize) -> Self {
        let amount = amount.min(self.len());
        if self.reversed {
            self.derive(self.root.take(self.len() - amount))
        } else {
            self.derive(self.root.skip(amount))
        }
    }

    /// Keeps only the first `amount` elements.
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

    /// Applies `function` to every element, preserving logical order.
    #[must_use]
    pub fn map<U, F>(&self, function: F) -> PersistentSeq<U>
    where
        U: Clone,
        F: FnMut(&T) -> U,
    {
        PersistentSeq::from_ordered(self.iter().map(function))
    }

    /// Keeps the elements satisfying `predicate`, preserving logical order.
    #[must_use]
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        let kept = self.oriented(self.iter().filter(|element| predicate(*element)).cloned());
        self.derive(kept)
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

impl<T> Default for PersistentSeq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PersistentSeq<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            reversed: self.reversed,
            hash: self.hash.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<T: Clone> FromIterator<T> for PersistentSeq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_ordered(iter)
    }
}

impl<T: Clone> IntoIterator for PersistentSeq<T> {
    type Item = T;
    type IntoIter = Enumerator<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.enumerator(0, self.len())
    }
}

impl<'a, T> IntoIterator for &'a PersistentSeq<T> {
    type Item = &'a T;
    type IntoIter = PersistentSeqIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<T: PartialEq> PartialEq for PersistentSeq<T> {
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
        self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for PersistentSeq<T> {}

impl<T: PartialOrd> PartialOrd for PersistentSeq<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord> Ord for PersistentSeq<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash> Hash for PersistentSeq<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        self.structural_hash().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentSeq<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentSeq<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        for (position, element) in self.iter().enumerate() {
            if position > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentSeq<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentSeqVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<T> PersistentSeqVisitor<T> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentSeqVisitor<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentSeq<T>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        const MAX_PREALLOCATE: usize = 4096;
        let capacity = seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATE);
        let mut elements = Vec::with_capacity(capacity);
        while let Some(element) = seq.next_element()? {
            elements.push(element);
        }
        Ok(PersistentSeq::from_ordered(elements))
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentSeq<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentSeqVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests
// =============================================================================

#[cfg(all(test, feature = "arc"))]
mod send_sync_tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(PersistentSeq<i32>: Send, Sync);
    assert_impl_all!(PersistentSeq<String>: Send, Sync);

    #[test]
    fn test_sequence_shared_across_threads() {
        let sequence: PersistentSeq<i32> = (0..1000).collect();
        std::thread::scope(|scope| {
            for offset in 0..4 {
                let sequence = &sequence;
                scope.spawn(move || {
                    let derived = sequence.push_back(offset);
                    assert_eq!(derived.len(), 1001);
                    assert_eq!(derived.enumerator(500, 10).count(), 10);
                });
            }
        });
        assert_eq!(sequence.len(), 1000);
    }
}

// =============================================================================
// Serde Tests
// =============================================================================

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_serialize_as_array() {
        let sequence: PersistentSeq<i32> = (1..=3).collect();
        assert_eq!(serde_json::to_string(&sequence).unwrap(), "[1,2,3]");
        assert_eq!(serde_json::to_string(&sequence.reverse()).unwrap(), "[3,2,1]");
    }

    #[rstest]
    fn test_deserialize_builds_balanced_tree() {
        let sequence: PersistentSeq<i32> = serde_json::from_str("[5,4,3,2,1]").unwrap();
        assert_eq!(sequence.iter().copied().collect::<Vec<_>>(), vec![5, 4, 3, 2, 1]);
        assert!(sequence.is_balanced());
    }
}
