//! Count-augmented AVL nodes and the balancing core.
//!
//! Both persistent collections in this crate are built from the same node
//! shape. A [`Subtree`] is either the [`Subtree::Empty`] sentinel or a shared
//! reference to an immutable [`Node`]. Every node records the number of
//! payloads beneath it (itself included) and its height, so that:
//!
//! - positional access is O(log N) without a separate index, and
//! - the AVL balance factor `left.height - right.height` can be checked at
//!   every reconstructed node.
//!
//! Nodes are never mutated after construction. Updates copy the nodes on the
//! path from the root to the mutation point and share every other subtree.
//!
//! # Internal Structure
//!
//! The AVL tree maintains the following invariants:
//! 1. `count = left.count + right.count + 1` for every node
//! 2. `height = 1 + max(left.height, right.height)`; `Empty` has height 0
//! 3. `|left.height - right.height| <= 1` for every node

use super::ReferenceCounter;
use std::collections::HashSet;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure for the AVL tree.
pub(crate) struct Node<P> {
    pub(crate) payload: P,
    pub(crate) left: Subtree<P>,
    pub(crate) right: Subtree<P>,
    pub(crate) count: usize,
    pub(crate) height: u8,
}

impl<P: Clone> Clone for Node<P> {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            left: self.left.clone(),
            right: self.right.clone(),
            count: self.count,
            height: self.height,
        }
    }
}

impl<P> Node<P> {
    /// Returns `left.height - right.height`.
    #[inline]
    pub(crate) fn balance_factor(&self) -> i16 {
        i16::from(self.left.height()) - i16::from(self.right.height())
    }
}

/// A possibly empty AVL subtree.
///
/// `Empty` terminates every branch, so recursive code never deals with a
/// missing child: an empty subtree simply has count 0 and height 0.
pub(crate) enum Subtree<P> {
    Empty,
    Node(ReferenceCounter<Node<P>>),
}

impl<P> Clone for Subtree<P> {
    #[inline]
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Node(node) => Self::Node(node.clone()),
        }
    }
}

impl<P> Default for Subtree<P> {
    #[inline]
    fn default() -> Self {
        Self::Empty
    }
}

impl<P> Subtree<P> {
    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Node(node) => node.count,
        }
    }

    #[inline]
    pub(crate) fn height(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Node(node) => node.height,
        }
    }

    /// Returns the node behind this subtree, or `None` for `Empty`.
    #[inline]
    pub(crate) fn node(&self) -> Option<&Node<P>> {
        match self {
            Self::Empty => None,
            Self::Node(node) => Some(node),
        }
    }

    /// Returns the shared node handle, or `None` for `Empty`.
    #[inline]
    pub(crate) fn handle(&self) -> Option<&ReferenceCounter<Node<P>>> {
        match self {
            Self::Empty => None,
            Self::Node(node) => Some(node),
        }
    }

    /// Balance factor of the root of this subtree, 0 for `Empty`.
    #[inline]
    pub(crate) fn balance_factor(&self) -> i16 {
        self.node().map_or(0, Node::balance_factor)
    }

    /// Returns `true` if both subtrees are the very same allocation.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Node(left), Self::Node(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Builds a node from its parts, recomputing count and height.
    ///
    /// This is the only place where count/height arithmetic happens.
    pub(crate) fn make(payload: P, left: Self, right: Self) -> Self {
        let count = left.count() + right.count() + 1;
        let height = left.height().max(right.height()) + 1;
        Self::Node(ReferenceCounter::new(Node {
            payload,
            left,
            right,
            count,
            height,
        }))
    }

    /// Creates a subtree holding a single payload.
    #[inline]
    pub(crate) fn leaf(payload: P) -> Self {
        Self::make(payload, Self::Empty, Self::Empty)
    }

    /// Payload of the leftmost node.
    pub(crate) fn first(&self) -> Option<&P> {
        let mut current = self.node()?;
        while let Some(left) = current.left.node() {
            current = left;
        }
        Some(&current.payload)
    }

    /// Payload of the rightmost node.
    pub(crate) fn last(&self) -> Option<&P> {
        let mut current = self.node()?;
        while let Some(right) = current.right.node() {
            current = right;
        }
        Some(&current.payload)
    }

    /// Checks the count and AVL invariants of every node, returning the
    /// number of nodes visited when they hold.
    pub(crate) fn verify(&self) -> Option<usize> {
        match self {
            Self::Empty => Some(0),
            Self::Node(node) => {
                let left = node.left.verify()?;
                let right = node.right.verify()?;
                let height = node.left.height().max(node.right.height()) + 1;
                let balanced = node.balance_factor().abs() <= 1;
                (balanced && node.height == height && node.count == left + right + 1)
                    .then_some(node.count)
            }
        }
    }

    /// Number of payloads of `self` held in nodes that are also reachable
    /// from `other`.
    ///
    /// A shared node shares its whole subtree, so the walk over `self` stops
    /// at the first shared node of every branch.
    pub(crate) fn shared_count(&self, other: &Self) -> usize {
        let mut nodes = HashSet::new();
        other.collect_nodes(&mut nodes);
        self.count_shared(&nodes)
    }

    fn collect_nodes(&self, nodes: &mut HashSet<*const Node<P>>) {
        if let Self::Node(node) = self {
            nodes.insert(ReferenceCounter::as_ptr(node));
            node.left.collect_nodes(nodes);
            node.right.collect_nodes(nodes);
        }
    }

    fn count_shared(&self, nodes: &HashSet<*const Node<P>>) -> usize {
        match self {
            Self::Empty => 0,
            Self::Node(node) if nodes.contains(&ReferenceCounter::as_ptr(node)) => node.count,
            Self::Node(node) => node.left.count_shared(nodes) + node.right.count_shared(nodes),
        }
    }
}

// =============================================================================
// Balancing Core
// =============================================================================

impl<P: Clone> Subtree<P> {
    /// Builds a node from its parts and restores the AVL invariant at that
    /// node.
    ///
    /// The children must already be valid AVL trees whose heights differ by
    /// at most 2, which holds for every single-payload insert or remove.
    pub(crate) fn balanced(payload: P, left: Self, right: Self) -> Self {
        let factor = i16::from(left.height()) - i16::from(right.height());
        if factor >= 2
            && let Self::Node(pivot) = &left
        {
            return if pivot.balance_factor() >= 0 {
                Self::rotate_right_parts(payload, pivot, right)
            } else {
                Self::double_rotate_right_parts(payload, pivot, right)
            };
        }
        if factor <= -2
            && let Self::Node(pivot) = &right
        {
            return if pivot.balance_factor() <= 0 {
                Self::rotate_left_parts(payload, left, pivot)
            } else {
                Self::double_rotate_left_parts(payload, left, pivot)
            };
        }
        Self::make(payload, left, right)
    }

    /// Restores the AVL invariant at the root of this subtree.
    ///
    /// Returns `self` untouched when its balance factor is within `[-1, 1]`.
    pub(crate) fn rebalance(self) -> Self {
        match self {
            Self::Node(node) if node.balance_factor() >= 2 => {
                let (payload, left, right) = Self::into_parts(node);
                let left = if left.balance_factor() < 0 { left.rotate_left() } else { left };
                Self::make(payload, left, right).rotate_right()
            }
            Self::Node(node) if node.balance_factor() <= -2 => {
                let (payload, left, right) = Self::into_parts(node);
                let right = if right.balance_factor() > 0 { right.rotate_right() } else { right };
                Self::make(payload, left, right).rotate_left()
            }
            other => other,
        }
    }

    /// Rotates this subtree to the right around its root.
    ///
    /// The in-order sequence is preserved. Subtrees without a left child are
    /// returned unchanged.
    pub(crate) fn rotate_right(self) -> Self {
        match self {
            Self::Node(node) if !node.left.is_empty() => {
                let (payload, left, right) = Self::into_parts(node);
                match &left {
                    Self::Node(pivot) => Self::rotate_right_parts(payload, pivot, right),
                    Self::Empty => Self::make(payload, left, right),
                }
            }
            other => other,
        }
    }

    /// Rotates this subtree to the left around its root.
    ///
    /// The in-order sequence is preserved. Subtrees without a right child are
    /// returned unchanged.
    pub(crate) fn rotate_left(self) -> Self {
        match self {
            Self::Node(node) if !node.right.is_empty() => {
                let (payload, left, right) = Self::into_parts(node);
                match &right {
                    Self::Node(pivot) => Self::rotate_left_parts(payload, left, pivot),
                    Self::Empty => Self::make(payload, left, right),
                }
            }
            other => other,
        }
    }

    /// Splits a node into its payload and children, cloning the payload only
    /// when the node is still shared.
    fn into_parts(node: ReferenceCounter<Node<P>>) -> (P, Self, Self) {
        let node = ReferenceCounter::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone());
        (node.payload, node.left, node.right)
    }

    fn rotate_right_parts(payload: P, pivot: &Node<P>, right: Self) -> Self {
        Self::make(
            pivot.payload.clone(),
            pivot.left.clone(),
            Self::make(payload, pivot.right.clone(), right),
        )
    }

    fn rotate_left_parts(payload: P, left: Self, pivot: &Node<P>) -> Self {
        Self::make(
            pivot.payload.clone(),
            Self::make(payload, left, pivot.left.clone()),
            pivot.right.clone(),
        )
    }

    fn double_rotate_right_parts(payload: P, pivot: &Node<P>, right: Self) -> Self {
        match &pivot.right {
            Self::Node(inner) => Self::make(
                inner.payload.clone(),
                Self::make(pivot.payload.clone(), pivot.left.clone(), inner.left.clone()),
                Self::make(payload, inner.right.clone(), right),
            ),
            Self::Empty => Self::rotate_right_parts(payload, pivot, right),
        }
    }

    fn double_rotate_left_parts(payload: P, left: Self, pivot: &Node<P>) -> Self {
        match &pivot.left {
            Self::Node(inner) => Self::make(
                inner.payload.clone(),
                Self::make(payload, left, inner.left.clone()),
                Self::make(pivot.payload.clone(), inner.right.clone(), pivot.right.clone()),
            ),
            Self::Empty => Self::rotate_left_parts(payload, left, pivot),
        }
    }

    // =========================================================================
    // Joining
    // =========================================================================

    /// Joins two trees around a pivot payload that sits between them in
    /// in-order position.
    ///
    /// Runs in O(|left.height - right.height| + 1) and rebalances every node
    /// rebuilt on the way down the taller spine.
    pub(crate) fn join(left: Self, payload: P, right: Self) -> Self {
        let left_height = i16::from(left.height());
        let right_height = i16::from(right.height());
        if left_height > right_height + 1
            && let Self::Node(node) = &left
        {
            let joined = Self::join(node.right.clone(), payload, right);
            return Self::make(node.payload.clone(), node.left.clone(), joined).rebalance();
        }
        if right_height > left_height + 1
            && let Self::Node(node) = &right
        {
            let joined = Self::join(left, payload, node.left.clone());
            return Self::make(node.payload.clone(), joined, node.right.clone()).rebalance();
        }
        Self::make(payload, left, right)
    }

    /// Concatenates two trees, every payload of `left` preceding every
    /// payload of `right`.
    pub(crate) fn concat(left: Self, right: Self) -> Self {
        if left.is_empty() {
            return right;
        }
        match right.remove_first() {
            None => left,
            Some((payload, rest)) => Self::join(left, payload, rest),
        }
    }

    /// Removes the leftmost payload, returning it with the remaining tree.
    pub(crate) fn remove_first(&self) -> Option<(P, Self)> {
        let node = self.node()?;
        Some(match node.left.remove_first() {
            None => (node.payload.clone(), node.right.clone()),
            Some((payload, rest)) => (
                payload,
                Self::balanced(node.payload.clone(), rest, node.right.clone()),
            ),
        })
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Builds a perfectly balanced tree from payloads in in-order position.
    ///
    /// Runs in O(N) by median split; no payload is cloned.
    pub(crate) fn from_ordered(items: Vec<P>) -> Self {
        let count = items.len();
        let mut items = items.into_iter();
        Self::build(&mut items, count)
    }

    fn build<I>(items: &mut I, count: usize) -> Self
    where
        I: Iterator<Item = P>,
    {
        if count == 0 {
            return Self::Empty;
        }
        let left_count = count / 2;
        let left = Self::build(items, left_count);
        let Some(payload) = items.next() else {
            return left;
        };
        let right = Self::build(items, count - left_count - 1);
        Self::make(payload, left, right)
    }
}

// =============================================================================
// Tests
// =============================================================================
