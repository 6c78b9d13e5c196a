//! Persistent (immutable) AVL collections.
//!
//! This module provides two immutable collections built on one
//! count-augmented AVL tree:
//!
//! - [`PersistentSeq`]: a sequence addressed by position
//! - [`PersistentSortedMap`]: a map ordered by a pluggable [`KeyOrder`]
//!
//! # Structural Sharing
//!
//! An update never touches an existing node. It copies the O(log N) nodes on
//! the path from the root to the affected position and shares every other
//! subtree with the version it was derived from, so old versions stay valid
//! and independent for as long as they are held.
//!
//! # Traversal
//!
//! Both collections enumerate with the same non-recursive walk, which can
//! start at any logical offset in O(log N), run in either direction and stop
//! after a bounded number of items. Borrowing iterators keep their stack
//! inline; owning [`Enumerator`]s borrow theirs from a small pool shared by
//! every version of a collection.
//!
//! # Examples
//!
//! ## `PersistentSeq`
//!
//! ```rust
//! use persistent_avl::persistent::PersistentSeq;
//!
//! let sequence: PersistentSeq<i32> = (0..100).collect();
//! assert_eq!(sequence.get(50), Some(&50));
//!
//! // Structural sharing: the original sequence is preserved
//! let updated = sequence.set_item(50, 999).unwrap();
//! assert_eq!(sequence.get(50), Some(&50));   // Original unchanged
//! assert_eq!(updated.get(50), Some(&999));   // New version
//! ```
//!
//! ## `PersistentSortedMap`
//!
//! ```rust
//! use persistent_avl::persistent::PersistentSortedMap;
//!
//! let map: PersistentSortedMap<String, i32> = PersistentSortedMap::new()
//!     .add_or_update("one".to_string(), 1)
//!     .add_or_update("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.add_or_update("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod enumerator;
mod error;
mod hashing;
mod indexed;
mod keyed;
mod node;
mod order;
mod pool;
mod sequence;
mod sorted_map;

pub use enumerator::Enumerator;
pub use enumerator::TreeIter;
pub use error::TreeError;
pub use error::TreeResult;
pub use order::KeyOrder;
pub use order::NaturalOrder;
pub use order::ReverseOrder;
pub use sequence::PersistentSeq;
pub use sequence::PersistentSeqIterator;
pub use sorted_map::PersistentSortedMap;
pub use sorted_map::PersistentSortedMapIterator;
pub use sorted_map::PersistentSortedMapKeys;
pub use sorted_map::PersistentSortedMapValues;

// =============================================================================
// Tests
// =============================================================================
