//! Non-recursive in-order traversal.
//!
//! One stack-based walk serves both collections and both directions. A
//! traversal starts by descending from the root to the payload at the
//! requested logical offset, using the same count arithmetic as positional
//! lookup, and pushing every ancestor whose payload comes later. Each step
//! then pops the next payload and pushes the near spine of its far child.
//! Starting at offset `k` therefore costs O(log N), not O(k).
//!
//! Two front ends share the walk:
//!
//! - [`TreeIter`] borrows the tree and keeps its stack inline (no heap
//!   allocation for trees up to height [`STACK_INLINE_DEPTH`]).
//! - [`Enumerator`] owns a reference to the root, yields cloned payloads,
//!   can be restarted at any offset, and borrows its stack from the
//!   collection's [`NodeStackPool`], returning it on drop.

use std::fmt;
use std::iter::FusedIterator;

use smallvec::SmallVec;

use super::ReferenceCounter;
use super::node::{Node, Subtree};
use super::pool::NodeStackPool;

/// Inline stack slots of a borrowed iterator.
pub(crate) const STACK_INLINE_DEPTH: usize = 32;

/// Pool of stacks for owning enumerators over payload `P`.
pub(crate) type StackPool<P> = NodeStackPool<ReferenceCounter<Node<P>>>;

// =============================================================================
// Shared Walk
// =============================================================================

/// Something that can stand in for a node on the traversal stack.
pub(crate) trait NodeHandle: Sized {
    fn left_child(&self) -> Option<Self>;
    fn right_child(&self) -> Option<Self>;
    fn left_count(&self) -> usize;
    fn right_count(&self) -> usize;
}

impl<'a, P> NodeHandle for &'a Node<P> {
    #[inline]
    fn left_child(&self) -> Option<Self> {
        let node: &'a Node<P> = *self;
        node.left.node()
    }

    #[inline]
    fn right_child(&self) -> Option<Self> {
        let node: &'a Node<P> = *self;
        node.right.node()
    }

    #[inline]
    fn left_count(&self) -> usize {
        self.left.count()
    }

    #[inline]
    fn right_count(&self) -> usize {
        self.right.count()
    }
}

impl<P> NodeHandle for ReferenceCounter<Node<P>> {
    #[inline]
    fn left_child(&self) -> Option<Self> {
        self.left.handle().cloned()
    }

    #[inline]
    fn right_child(&self) -> Option<Self> {
        self.right.handle().cloned()
    }

    #[inline]
    fn left_count(&self) -> usize {
        self.left.count()
    }

    #[inline]
    fn right_count(&self) -> usize {
        self.right.count()
    }
}

/// Minimal LIFO interface over the stack storages in use.
pub(crate) trait TraversalStack<H> {
    fn push_node(&mut self, node: H);
    fn pop_node(&mut self) -> Option<H>;
    fn clear_nodes(&mut self);
}

impl<H> TraversalStack<H> for Vec<H> {
    #[inline]
    fn push_node(&mut self, node: H) {
        self.push(node);
    }

    #[inline]
    fn pop_node(&mut self) -> Option<H> {
        self.pop()
    }

    #[inline]
    fn clear_nodes(&mut self) {
        self.clear();
    }
}

impl<H> TraversalStack<H> for SmallVec<[H; STACK_INLINE_DEPTH]> {
    #[inline]
    fn push_node(&mut self, node: H) {
        self.push(node);
    }

    #[inline]
    fn pop_node(&mut self) -> Option<H> {
        self.pop()
    }

    #[inline]
    fn clear_nodes(&mut self) {
        self.clear();
    }
}

/// Pushes the path from `root` to the payload at logical offset `start`.
///
/// In reverse, offsets count from the rightmost payload.
fn seek<H, S>(stack: &mut S, root: Option<H>, start: usize, reversed: bool)
where
    H: NodeHandle,
    S: TraversalStack<H>,
{
    let mut current = root;
    let mut index = start;
    while let Some(node) = current {
        let near_count = if reversed { node.right_count() } else { node.left_count() };
        if index < near_count {
            current = if reversed { node.right_child() } else { node.left_child() };
            stack.push_node(node);
        } else if index == near_count {
            stack.push_node(node);
            return;
        } else {
            index -= near_count + 1;
            current = if reversed { node.left_child() } else { node.right_child() };
        }
    }
}

/// Pops the next node and pushes the near spine of its far child.
fn step<H, S>(stack: &mut S, reversed: bool) -> Option<H>
where
    H: NodeHandle,
    S: TraversalStack<H>,
{
    let node = stack.pop_node()?;
    let mut child = if reversed { node.left_child() } else { node.right_child() };
    while let Some(next) = child {
        child = if reversed { next.right_child() } else { next.left_child() };
        stack.push_node(next);
    }
    Some(node)
}

/// Clips a `(start, count)` window to a tree of `total` payloads.
const fn clip(total: usize, start: usize, count: usize) -> (usize, usize) {
    let start = if start < total { start } else { total };
    let available = total - start;
    (start, if count < available { count } else { available })
}

// =============================================================================
// Borrowed Iterator
// =============================================================================

/// A borrowing in-order iterator over the payloads of a tree.
///
/// Honors a start offset, an item budget and a direction.
pub struct TreeIter<'a, P> {
    stack: SmallVec<[&'a Node<P>; STACK_INLINE_DEPTH]>,
    remaining: usize,
    reversed: bool,
}

impl<'a, P> TreeIter<'a, P> {
    pub(crate) fn new(root: &'a Subtree<P>, start: usize, count: usize, reversed: bool) -> Self {
        let (start, remaining) = clip(root.count(), start, count);
        let mut stack = SmallVec::new();
        if remaining > 0 {
            seek(&mut stack, root.node(), start, reversed);
        }
        Self {
            stack,
            remaining,
            reversed,
        }
    }
}

impl<'a, P> Iterator for TreeIter<'a, P> {
    type Item = &'a P;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = step(&mut self.stack, self.reversed)?;
        self.remaining -= 1;
        Some(&node.payload)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P> ExactSizeIterator for TreeIter<'_, P> {}

impl<P> FusedIterator for TreeIter<'_, P> {}

impl<P> Clone for TreeIter<'_, P> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            remaining: self.remaining,
            reversed: self.reversed,
        }
    }
}

impl<P> fmt::Debug for TreeIter<'_, P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TreeIter")
            .field("remaining", &self.remaining)
            .field("reversed", &self.reversed)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Owning Enumerator
// =============================================================================

/// An owning, restartable in-order enumerator yielding cloned payloads.
///
/// The enumerator keeps the root it was created from alive, so later
/// versions of the collection never affect it. Its traversal stack comes
/// from the collection's pool and goes back there on drop.
pub struct Enumerator<P> {
    root: Subtree<P>,
    pool: ReferenceCounter<StackPool<P>>,
    stack: Vec<ReferenceCounter<Node<P>>>,
    count: usize,
    remaining: usize,
    reversed: bool,
}

impl<P> Enumerator<P> {
    pub(crate) fn new(
        root: Subtree<P>,
        pool: ReferenceCounter<StackPool<P>>,
        start: usize,
        count: usize,
        reversed: bool,
    ) -> Self {
        let stack = pool.acquire();
        let mut enumerator = Self {
            root,
            pool,
            stack,
            count,
            remaining: 0,
            reversed,
        };
        enumerator.reset(start);
        enumerator
    }

    /// Restarts the enumeration at logical offset `start`, keeping the item
    /// budget the enumerator was created with.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub fn reset(&mut self, start: usize) {
        self.stack.clear_nodes();
        let (start, remaining) = clip(self.root.count(), start, self.count);
        self.remaining = remaining;
        if remaining > 0 {
            seek(&mut self.stack, self.root.handle().cloned(), start, self.reversed);
        }
    }

    /// Returns `true` if the enumeration runs in descending order.
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }
}

impl<P: Clone> Iterator for Enumerator<P> {
    type Item = P;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = step(&mut self.stack, self.reversed)?;
        self.remaining -= 1;
        Some(node.payload.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P: Clone> ExactSizeIterator for Enumerator<P> {}

impl<P: Clone> FusedIterator for Enumerator<P> {}

impl<P> Drop for Enumerator<P> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.stack));
    }
}

impl<P> fmt::Debug for Enumerator<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Enumerator")
            .field("remaining", &self.remaining)
            .field("reversed", &self.reversed)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
