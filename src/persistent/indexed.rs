//! Positional operations on count-augmented subtrees.
//!
//! These primitives address payloads by in-order position, using the
//! per-node counts to descend in O(log N). They assume validated input: the
//! public handles check bounds once before calling in.

use std::cmp::Ordering;

use super::node::{Node, Subtree};

impl<P> Subtree<P> {
    /// Returns the payload at `index`, or `None` past the end.
    pub(crate) fn get_at(&self, index: usize) -> Option<&P> {
        let mut current = self.node()?;
        let mut index = index;
        loop {
            let left_count = current.left.count();
            match index.cmp(&left_count) {
                Ordering::Equal => return Some(&current.payload),
                Ordering::Less => current = current.left.node()?,
                Ordering::Greater => {
                    index -= left_count + 1;
                    current = current.right.node()?;
                }
            }
        }
    }

    /// Windowed binary search over in-order positions `[start, end)`.
    ///
    /// `compare` orders a payload against the sought value. Returns
    /// `Ok(position)` of a match, or `Err(position)` where the value would be
    /// inserted to keep the window ordered.
    pub(crate) fn search_window<F>(&self, start: usize, end: usize, mut compare: F) -> Result<usize, usize>
    where
        F: FnMut(&P) -> Ordering,
    {
        let mut current = self;
        let mut offset = 0;
        while let Some(node) = current.node() {
            let position = offset + node.left.count();
            if position < start {
                offset = position + 1;
                current = &node.right;
            } else if position >= end {
                current = &node.left;
            } else {
                match compare(&node.payload) {
                    Ordering::Equal => return Ok(position),
                    Ordering::Less => {
                        offset = position + 1;
                        current = &node.right;
                    }
                    Ordering::Greater => current = &node.left,
                }
            }
        }
        Err(offset.clamp(start, end))
    }
}

impl<P: Clone> Subtree<P> {
    /// Inserts `payload` so that it lands at position `index`.
    ///
    /// `index` may equal `count()` to append.
    pub(crate) fn insert_at(&self, index: usize, payload: P) -> Self {
        match self.node() {
            None => Self::leaf(payload),
            Some(node) => {
                let left_count = node.left.count();
                if index <= left_count {
                    let left = node.left.insert_at(index, payload);
                    Self::balanced(node.payload.clone(), left, node.right.clone())
                } else {
                    let right = node.right.insert_at(index - left_count - 1, payload);
                    Self::balanced(node.payload.clone(), node.left.clone(), right)
                }
            }
        }
    }

    /// Splices a whole subtree in so that its first payload lands at
    /// position `index`.
    pub(crate) fn insert_tree_at(&self, index: usize, tree: &Self) -> Self {
        if tree.is_empty() {
            return self.clone();
        }
        match self.node() {
            None => tree.clone(),
            Some(node) => {
                let left_count = node.left.count();
                if index <= left_count {
                    let left = node.left.insert_tree_at(index, tree);
                    Self::join(left, node.payload.clone(), node.right.clone())
                } else {
                    let right = node.right.insert_tree_at(index - left_count - 1, tree);
                    Self::join(node.left.clone(), node.payload.clone(), right)
                }
            }
        }
    }

    /// Removes the payload at `index`.
    pub(crate) fn remove_at(&self, index: usize) -> Self {
        let Some(node) = self.node() else {
            return Self::Empty;
        };
        let left_count = node.left.count();
        match index.cmp(&left_count) {
            Ordering::Less => {
                let left = node.left.remove_at(index);
                Self::balanced(node.payload.clone(), left, node.right.clone())
            }
            Ordering::Greater => {
                let right = node.right.remove_at(index - left_count - 1);
                Self::balanced(node.payload.clone(), node.left.clone(), right)
            }
            Ordering::Equal => node.unlink(),
        }
    }

    /// Replaces the payload at `index`. The shape is unchanged.
    pub(crate) fn set_at(&self, index: usize, payload: P) -> Self {
        let Some(node) = self.node() else {
            return Self::Empty;
        };
        let left_count = node.left.count();
        match index.cmp(&left_count) {
            Ordering::Equal => Self::make(payload, node.left.clone(), node.right.clone()),
            Ordering::Less => Self::make(
                node.payload.clone(),
                node.left.set_at(index, payload),
                node.right.clone(),
            ),
            Ordering::Greater => Self::make(
                node.payload.clone(),
                node.left.clone(),
                node.right.set_at(index - left_count - 1, payload),
            ),
        }
    }

    /// Keeps only the payloads at positions `>= amount`.
    pub(crate) fn skip(&self, amount: usize) -> Self {
        if amount == 0 {
            return self.clone();
        }
        let Some(node) = self.node() else {
            return Self::Empty;
        };
        if amount >= node.count {
            return Self::Empty;
        }
        let left_count = node.left.count();
        if amount <= left_count {
            Self::join(node.left.skip(amount), node.payload.clone(), node.right.clone())
        } else {
            node.right.skip(amount - left_count - 1)
        }
    }

    /// Keeps only the payloads at positions `< amount`.
    pub(crate) fn take(&self, amount: usize) -> Self {
        let Some(node) = self.node() else {
            return Self::Empty;
        };
        if amount >= node.count {
            return self.clone();
        }
        let left_count = node.left.count();
        if amount <= left_count {
            node.left.take(amount)
        } else {
            Self::join(
                node.left.clone(),
                node.payload.clone(),
                node.right.take(amount - left_count - 1),
            )
        }
    }

    /// Removes `count` payloads starting at position `start`.
    pub(crate) fn remove_window(&self, start: usize, count: usize) -> Self {
        if count == 0 {
            return self.clone();
        }
        Self::concat(self.take(start), self.skip(start.saturating_add(count)))
    }
}

impl<P: Clone> Node<P> {
    /// Subtree left behind once this node's own payload is removed.
    ///
    /// With two children the in-order successor takes the node's place.
    pub(crate) fn unlink(&self) -> Subtree<P> {
        match (&self.left, &self.right) {
            (left, Subtree::Empty) => left.clone(),
            (Subtree::Empty, right) => right.clone(),
            (left, right) => match right.remove_first() {
                Some((successor, rest)) => Subtree::balanced(successor, left.clone(), rest),
                None => left.clone(),
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tree(items: &[i32]) -> Subtree<i32> {
        Subtree::from_ordered(items.to_vec())
    }

    fn items(tree: &Subtree<i32>) -> Vec<i32> {
        (0..tree.count()).filter_map(|index| tree.get_at(index).copied()).collect()
    }

    #[rstest]
    fn test_get_at_each_position() {
        let tree = tree(&[10, 20, 30, 40, 50]);
        assert_eq!(tree.get_at(0), Some(&10));
        assert_eq!(tree.get_at(2), Some(&30));
        assert_eq!(tree.get_at(4), Some(&50));
        assert_eq!(tree.get_at(5), None);
    }

    #[rstest]
    #[case(0, vec![99, 10, 20, 30])]
    #[case(1, vec![10, 99, 20, 30])]
    #[case(3, vec![10, 20, 30, 99])]
    fn test_insert_at(#[case] index: usize, #[case] expected: Vec<i32>) {
        let inserted = tree(&[10, 20, 30]).insert_at(index, 99);
        assert_eq!(items(&inserted), expected);
        assert_eq!(inserted.verify(), Some(4));
    }

    #[rstest]
    fn test_insert_ascending_stays_balanced() {
        let mut tree = Subtree::Empty;
        for value in 0..500 {
            tree = tree.insert_at(tree.count(), value);
            assert!(tree.verify().is_some());
        }
        assert_eq!(items(&tree), (0..500).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_insert_tree_at_middle() {
        let base = tree(&(0..50).collect::<Vec<_>>());
        let inserted = base.insert_tree_at(10, &tree(&[-1, -2, -3]));
        let mut expected: Vec<i32> = (0..10).collect();
        expected.extend([-1, -2, -3]);
        expected.extend(10..50);
        assert_eq!(items(&inserted), expected);
        assert_eq!(inserted.verify(), Some(53));
    }

    #[rstest]
    #[case(0, vec![20, 30])]
    #[case(1, vec![10, 30])]
    #[case(2, vec![10, 20])]
    fn test_remove_at(#[case] index: usize, #[case] expected: Vec<i32>) {
        let removed = tree(&[10, 20, 30]).remove_at(index);
        assert_eq!(items(&removed), expected);
        assert_eq!(removed.verify(), Some(2));
    }

    #[rstest]
    fn test_remove_everything_front_to_back() {
        let mut tree = tree(&(0..200).collect::<Vec<_>>());
        for expected_first in 0..200 {
            assert_eq!(tree.get_at(0), Some(&expected_first));
            tree = tree.remove_at(0);
            assert!(tree.verify().is_some());
        }
        assert!(tree.is_empty());
    }

    #[rstest]
    fn test_set_at_keeps_shape_and_shares_siblings() {
        let original = tree(&(0..15).collect::<Vec<_>>());
        let updated = original.set_at(0, 100);
        assert_eq!(updated.get_at(0), Some(&100));
        assert_eq!(original.get_at(0), Some(&0));
        assert_eq!(updated.height(), original.height());
        let (original_root, updated_root) = (original.node().unwrap(), updated.node().unwrap());
        assert!(original_root.right.ptr_eq(&updated_root.right));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(17)]
    #[case(63)]
    #[case(64)]
    #[case(100)]
    fn test_skip_and_take(#[case] amount: usize) {
        let source: Vec<i32> = (0..64).collect();
        let tree = tree(&source);
        let skipped = tree.skip(amount);
        let taken = tree.take(amount);
        let split = amount.min(source.len());
        assert_eq!(items(&skipped), source[split..].to_vec());
        assert_eq!(items(&taken), source[..split].to_vec());
        assert!(skipped.verify().is_some());
        assert!(taken.verify().is_some());
    }

    #[rstest]
    fn test_remove_window() {
        let tree = tree(&(0..20).collect::<Vec<_>>());
        let removed = tree.remove_window(5, 10);
        let expected: Vec<i32> = (0..5).chain(15..20).collect();
        assert_eq!(items(&removed), expected);
        assert!(removed.verify().is_some());
    }

    #[rstest]
    #[case(30, 0, 5, Ok(2))]
    #[case(35, 0, 5, Err(3))]
    #[case(5, 0, 5, Err(0))]
    #[case(99, 0, 5, Err(5))]
    #[case(10, 2, 2, Err(2))]
    #[case(50, 1, 2, Err(3))]
    #[case(40, 1, 3, Ok(3))]
    fn test_search_window(
        #[case] value: i32,
        #[case] start: usize,
        #[case] count: usize,
        #[case] expected: Result<usize, usize>,
    ) {
        let tree = tree(&[10, 20, 30, 40, 50]);
        let found = tree.search_window(start, start + count, |payload| payload.cmp(&value));
        assert_eq!(found, expected);
    }
}
