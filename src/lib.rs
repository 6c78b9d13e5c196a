//! # persistent-avl
//!
//! Persistent (immutable) AVL collections for Rust.
//!
//! ## Overview
//!
//! Both collections share one self-balancing, count-augmented binary tree
//! and differ only in how payloads are ordered:
//!
//! - **`PersistentSeq`**: ordered by position, with O(log N) indexed
//!   insert, remove, update, slicing and bulk splicing
//! - **`PersistentSortedMap`**: ordered by a type-level key order, with
//!   O(log N) keyed updates, nearest-neighbour and range queries, and set
//!   algebra
//!
//! Every update returns a new version that shares all untouched subtrees
//! with the old one. Enumeration is non-recursive, can start at any offset in
//! O(log N), runs in either direction, and recycles its traversal stacks
//! through a small thread-safe pool.
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes through `Arc` instead of `Rc`, making the
//!   collections `Send + Sync`
//! - `serde`: `Serialize`/`Deserialize` for both collections
//! - `fxhash`: structural hashing with `FxHasher`
//!
//! ## Example
//!
//! ```rust
//! use persistent_avl::prelude::*;
//!
//! let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
//! let window: Vec<i32> = sequence.enumerator(2, 2).collect();
//! assert_eq!(window, vec![30, 40]);
//!
//! let map: PersistentSortedMap<i32, &str> = [(1, "a"), (2, "b")].into_iter().collect();
//! let other: PersistentSortedMap<i32, &str> = [(2, "B"), (3, "c")].into_iter().collect();
//! assert_eq!(map.union(&other).to_string(), "{1: a, 2: B, 3: c}");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use persistent_avl::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
}

pub mod persistent;
