//! Pluggable key orderings for [`PersistentSortedMap`](super::PersistentSortedMap).
//!
//! The ordering is a capability chosen at the type level: a map's third type
//! parameter names a zero-sized type implementing [`KeyOrder`], and every
//! ordering decision the map makes goes through it. Key equality is always
//! `compare(a, b) == Ordering::Equal`, never `PartialEq` or identity.
//!
//! # Examples
//!
//! ```rust
//! use persistent_avl::persistent::{KeyOrder, PersistentSortedMap};
//! use std::cmp::Ordering;
//!
//! struct CaseInsensitive;
//!
//! impl KeyOrder<str> for CaseInsensitive {
//!     fn compare(left: &str, right: &str) -> Ordering {
//!         left.to_lowercase().cmp(&right.to_lowercase())
//!     }
//! }
//!
//! impl KeyOrder<String> for CaseInsensitive {
//!     fn compare(left: &String, right: &String) -> Ordering {
//!         <Self as KeyOrder<str>>::compare(left, right)
//!     }
//! }
//!
//! let map: PersistentSortedMap<String, i32, CaseInsensitive> = PersistentSortedMap::new()
//!     .add_or_update("Apple".to_string(), 1)
//!     .add_or_update("apple".to_string(), 2);
//! assert_eq!(map.len(), 1);
//! assert_eq!(map.get("APPLE"), Some(&2));
//! ```

use std::cmp::Ordering;

/// A total order over keys, supplied at the type level.
///
/// Implementations must be consistent: a total order that does not change
/// over the lifetime of any map using it. When a map is queried with a
/// borrowed form `Q` of its key type `K`, `KeyOrder<Q>` must agree with
/// `KeyOrder<K>`.
pub trait KeyOrder<K: ?Sized> {
    /// Compares two keys.
    fn compare(left: &K, right: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> KeyOrder<K> for NaturalOrder {
    #[inline]
    fn compare(left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}

/// Orders keys by the reverse of their [`Ord`] implementation.
///
/// # Examples
///
/// ```rust
/// use persistent_avl::persistent::{PersistentSortedMap, ReverseOrder};
///
/// let map: PersistentSortedMap<i32, &str, ReverseOrder> =
///     [(1, "one"), (3, "three"), (2, "two")].into_iter().collect();
/// let keys: Vec<&i32> = map.keys().collect();
/// assert_eq!(keys, vec![&3, &2, &1]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReverseOrder;

impl<K: Ord + ?Sized> KeyOrder<K> for ReverseOrder {
    #[inline]
    fn compare(left: &K, right: &K) -> Ordering {
        right.cmp(left)
    }
}
