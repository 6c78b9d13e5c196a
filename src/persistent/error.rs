//! Errors raised at the public boundary of the persistent trees.
//!
//! Internal tree primitives are total over validated input; every check
//! happens once, in the handle types, before a walk begins. A failed
//! operation never produces a partial tree: the receiver is untouched.

use thiserror::Error;

/// Failure of a bounds-checked or key-checked tree operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum TreeError {
    /// A position outside `[0, length)` was read, replaced or removed.
    #[error("index {index} out of range for length {length}")]
    IndexOutOfRange {
        /// The offending position.
        index: usize,
        /// Length of the collection at the time of the call.
        length: usize,
    },
    /// An insertion position outside `[0, length]` was given.
    #[error("insertion index {index} out of range for length {length}")]
    InsertOutOfRange {
        /// The offending position.
        index: usize,
        /// Length of the collection at the time of the call.
        length: usize,
    },
    /// A window `[start, start + count)` extends past the end.
    #[error("range of {count} starting at {start} out of bounds for length {length}")]
    RangeOutOfBounds {
        /// First position of the window.
        start: usize,
        /// Number of positions in the window.
        count: usize,
        /// Length of the collection at the time of the call.
        length: usize,
    },
    /// A strict insert found the key already present.
    #[error("an entry with the same key already exists")]
    DuplicateKey,
    /// A strict update or lookup found no entry for the key.
    #[error("the given key was not present")]
    KeyNotFound,
    /// Input promised to be strictly ascending was not.
    #[error("input is not strictly ascending at position {position}")]
    UnsortedInput {
        /// Position of the first key that does not follow its predecessor.
        position: usize,
    },
}

/// Result alias for fallible tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

impl TreeError {
    /// Checks `index` against `[0, length)`.
    pub(crate) const fn check_index(index: usize, length: usize) -> TreeResult<()> {
        if index < length {
            Ok(())
        } else {
            Err(Self::IndexOutOfRange { index, length })
        }
    }

    /// Checks `index` against `[0, length]`.
    pub(crate) const fn check_insert(index: usize, length: usize) -> TreeResult<()> {
        if index <= length {
            Ok(())
        } else {
            Err(Self::InsertOutOfRange { index, length })
        }
    }

    /// Checks that `[start, start + count)` lies within `[0, length]`.
    pub(crate) const fn check_window(start: usize, count: usize, length: usize) -> TreeResult<()> {
        if start <= length && count <= length - start {
            Ok(())
        } else {
            Err(Self::RangeOutOfBounds { start, count, length })
        }
    }
}
