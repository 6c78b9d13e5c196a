//! Key-ordered operations on subtrees whose payloads are `(key, value)`
//! pairs.
//!
//! Every ordering decision goes through the [`KeyOrder`] capability `O`.
//! Lookups accept any borrowed form `Q` of the key, as long as `O` orders it
//! consistently with `K`.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::ops::Bound;

use super::node::Subtree;
use super::order::KeyOrder;

/// What to do when an inserted key is already present.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Conflict {
    /// Leave the tree untouched and report the existing key.
    Keep,
    /// Replace the existing value.
    Replace,
}

/// Outcome of a keyed insert.
pub(crate) enum Inserted<P> {
    /// A new key was added.
    Added(Subtree<P>),
    /// An existing key had its value replaced; the shape is unchanged.
    Replaced(Subtree<P>),
    /// The key was present and the conflict policy kept the original.
    Existing,
}

impl<K, V> Subtree<(K, V)> {
    /// Returns the entry whose key orders equal to `key`.
    pub(crate) fn find_entry<O, Q>(&self, key: &Q) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let mut current = self.node()?;
        loop {
            match O::compare(key, current.payload.0.borrow()) {
                Ordering::Equal => return Some(&current.payload),
                Ordering::Less => current = current.left.node()?,
                Ordering::Greater => current = current.right.node()?,
            }
        }
    }

    /// Returns the in-order position of `key`.
    pub(crate) fn position_of<O, Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let mut current = self.node()?;
        let mut offset = 0;
        loop {
            match O::compare(key, current.payload.0.borrow()) {
                Ordering::Equal => return Some(offset + current.left.count()),
                Ordering::Less => current = current.left.node()?,
                Ordering::Greater => {
                    offset += current.left.count() + 1;
                    current = current.right.node()?;
                }
            }
        }
    }

    /// Number of entries whose key orders before `key` (or equal to it when
    /// `inclusive`). Subtrees entirely on one side are counted, not visited.
    pub(crate) fn count_below<O, Q>(&self, key: &Q, inclusive: bool) -> usize
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let mut current = self;
        let mut below = 0;
        while let Some(node) = current.node() {
            let ordering = O::compare(node.payload.0.borrow(), key);
            if ordering == Ordering::Less || (inclusive && ordering == Ordering::Equal) {
                below += node.left.count() + 1;
                current = &node.right;
            } else {
                current = &node.left;
            }
        }
        below
    }

    /// In-order positions `[start, end)` of the entries within `bounds`.
    pub(crate) fn window_of<O, Q>(&self, lower: Bound<&Q>, upper: Bound<&Q>) -> (usize, usize)
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let start = match lower {
            Bound::Included(key) => self.count_below::<O, Q>(key, false),
            Bound::Excluded(key) => self.count_below::<O, Q>(key, true),
            Bound::Unbounded => 0,
        };
        let end = match upper {
            Bound::Included(key) => self.count_below::<O, Q>(key, true),
            Bound::Excluded(key) => self.count_below::<O, Q>(key, false),
            Bound::Unbounded => self.count(),
        };
        (start, end.max(start))
    }

    /// Greatest entry with a key strictly less than `key`.
    pub(crate) fn predecessor<O, Q>(&self, key: &Q) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.nearest::<O, Q>(key, false, Ordering::Less)
    }

    /// Least entry with a key strictly greater than `key`.
    pub(crate) fn successor<O, Q>(&self, key: &Q) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.nearest::<O, Q>(key, false, Ordering::Greater)
    }

    /// Entry for `key`, or else its predecessor.
    pub(crate) fn or_predecessor<O, Q>(&self, key: &Q) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.nearest::<O, Q>(key, true, Ordering::Less)
    }

    /// Entry for `key`, or else its successor.
    pub(crate) fn or_successor<O, Q>(&self, key: &Q) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        self.nearest::<O, Q>(key, true, Ordering::Greater)
    }

    /// Descends toward `key`, remembering the best candidate on the `side`
    /// of it every time the path turns away from that side.
    fn nearest<O, Q>(&self, key: &Q, inclusive: bool, side: Ordering) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let mut current = self;
        let mut best = None;
        while let Some(node) = current.node() {
            // Ordering of the node's key relative to the sought key.
            let ordering = O::compare(node.payload.0.borrow(), key);
            if ordering == Ordering::Equal {
                if inclusive {
                    return Some(&node.payload);
                }
                current = if side == Ordering::Less { &node.left } else { &node.right };
            } else if ordering == side {
                best = Some(&node.payload);
                current = if side == Ordering::Less { &node.right } else { &node.left };
            } else {
                current = if side == Ordering::Less { &node.left } else { &node.right };
            }
        }
        best
    }
}

impl<K: Clone, V: Clone> Subtree<(K, V)> {
    /// Inserts `(key, value)`, resolving an existing key with `conflict`.
    pub(crate) fn insert_entry<O>(&self, key: K, value: V, conflict: Conflict) -> Inserted<(K, V)>
    where
        O: KeyOrder<K>,
    {
        let Some(node) = self.node() else {
            return Inserted::Added(Self::leaf((key, value)));
        };
        match O::compare(&key, &node.payload.0) {
            Ordering::Less => match node.left.insert_entry::<O>(key, value, conflict) {
                Inserted::Added(left) => {
                    Inserted::Added(Self::balanced(node.payload.clone(), left, node.right.clone()))
                }
                Inserted::Replaced(left) => {
                    Inserted::Replaced(Self::make(node.payload.clone(), left, node.right.clone()))
                }
                Inserted::Existing => Inserted::Existing,
            },
            Ordering::Greater => match node.right.insert_entry::<O>(key, value, conflict) {
                Inserted::Added(right) => {
                    Inserted::Added(Self::balanced(node.payload.clone(), node.left.clone(), right))
                }
                Inserted::Replaced(right) => {
                    Inserted::Replaced(Self::make(node.payload.clone(), node.left.clone(), right))
                }
                Inserted::Existing => Inserted::Existing,
            },
            Ordering::Equal => match conflict {
                Conflict::Keep => Inserted::Existing,
                Conflict::Replace => Inserted::Replaced(Self::make(
                    (node.payload.0.clone(), value),
                    node.left.clone(),
                    node.right.clone(),
                )),
            },
        }
    }

    /// Replaces the value stored under `key`, or returns `None` if the key
    /// is absent. The stored key is kept.
    pub(crate) fn replace_value<O, Q>(&self, key: &Q, value: V) -> Option<Self>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let node = self.node()?;
        Some(match O::compare(key, node.payload.0.borrow()) {
            Ordering::Less => Self::make(
                node.payload.clone(),
                node.left.replace_value::<O, Q>(key, value)?,
                node.right.clone(),
            ),
            Ordering::Greater => Self::make(
                node.payload.clone(),
                node.left.clone(),
                node.right.replace_value::<O, Q>(key, value)?,
            ),
            Ordering::Equal => Self::make(
                (node.payload.0.clone(), value),
                node.left.clone(),
                node.right.clone(),
            ),
        })
    }

    /// Removes `key`, or returns `None` if it is absent.
    pub(crate) fn remove_entry<O, Q>(&self, key: &Q) -> Option<Self>
    where
        K: Borrow<Q>,
        O: KeyOrder<Q>,
        Q: ?Sized,
    {
        let node = self.node()?;
        Some(match O::compare(key, node.payload.0.borrow()) {
            Ordering::Less => Self::balanced(
                node.payload.clone(),
                node.left.remove_entry::<O, Q>(key)?,
                node.right.clone(),
            ),
            Ordering::Greater => Self::balanced(
                node.payload.clone(),
                node.left.clone(),
                node.right.remove_entry::<O, Q>(key)?,
            ),
            Ordering::Equal => node.unlink(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::order::{NaturalOrder, ReverseOrder};
    use rstest::rstest;

    fn tree(keys: &[i32]) -> Subtree<(i32, String)> {
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        Subtree::from_ordered(sorted.into_iter().map(|key| (key, key.to_string())).collect())
    }

    fn keys(tree: &Subtree<(i32, String)>) -> Vec<i32> {
        (0..tree.count())
            .filter_map(|index| tree.get_at(index).map(|entry| entry.0))
            .collect()
    }

    fn added(outcome: Inserted<(i32, String)>) -> Subtree<(i32, String)> {
        match outcome {
            Inserted::Added(tree) => tree,
            _ => panic!("expected a new key"),
        }
    }

    #[rstest]
    fn test_find_entry() {
        let tree = tree(&[10, 20, 30, 40]);
        assert_eq!(tree.find_entry::<NaturalOrder, _>(&30).map(|e| e.1.as_str()), Some("30"));
        assert!(tree.find_entry::<NaturalOrder, _>(&35).is_none());
    }

    #[rstest]
    fn test_insert_keeps_keys_sorted_and_balanced() {
        let mut tree = Subtree::Empty;
        for key in [50, 10, 40, 20, 30, 60, 0, 5, 45] {
            tree = added(tree.insert_entry::<NaturalOrder>(key, key.to_string(), Conflict::Keep));
            assert!(tree.verify().is_some());
        }
        assert_eq!(keys(&tree), vec![0, 5, 10, 20, 30, 40, 45, 50, 60]);
    }

    #[rstest]
    fn test_insert_with_reverse_order() {
        let mut tree = Subtree::Empty;
        for key in [1, 3, 2] {
            tree = added(tree.insert_entry::<ReverseOrder>(key, key.to_string(), Conflict::Keep));
        }
        assert_eq!(keys(&tree), vec![3, 2, 1]);
    }

    #[rstest]
    fn test_insert_existing_key_policies() {
        let tree = tree(&[1, 2, 3]);
        assert!(matches!(
            tree.insert_entry::<NaturalOrder>(2, "x".to_string(), Conflict::Keep),
            Inserted::Existing
        ));
        match tree.insert_entry::<NaturalOrder>(2, "x".to_string(), Conflict::Replace) {
            Inserted::Replaced(replaced) => {
                assert_eq!(replaced.count(), 3);
                assert_eq!(replaced.find_entry::<NaturalOrder, _>(&2).map(|e| e.1.as_str()), Some("x"));
            }
            _ => panic!("expected a replacement"),
        }
    }

    struct AbsoluteOrder;

    impl KeyOrder<i32> for AbsoluteOrder {
        fn compare(left: &i32, right: &i32) -> Ordering {
            left.unsigned_abs().cmp(&right.unsigned_abs())
        }
    }

    #[rstest]
    fn test_replace_keeps_stored_key() {
        let tree = tree(&[1, 2, 3]);
        match tree.insert_entry::<AbsoluteOrder>(-2, "x".to_string(), Conflict::Replace) {
            Inserted::Replaced(replaced) => {
                assert_eq!(keys(&replaced), vec![1, 2, 3]);
                assert_eq!(
                    replaced.find_entry::<AbsoluteOrder, _>(&-2).map(|(key, value)| (*key, value.as_str())),
                    Some((2, "x"))
                );
            }
            _ => panic!("expected a replacement"),
        }
    }

    #[rstest]
    fn test_replace_value_absent_key() {
        let tree = tree(&[1, 2, 3]);
        assert!(tree.replace_value::<NaturalOrder, _>(&4, "x".to_string()).is_none());
    }

    #[rstest]
    fn test_remove_entry() {
        let tree = tree(&(0..32).collect::<Vec<_>>());
        let removed = tree.remove_entry::<NaturalOrder, _>(&16).unwrap();
        assert!(removed.find_entry::<NaturalOrder, _>(&16).is_none());
        assert_eq!(removed.count(), 31);
        assert!(removed.verify().is_some());
        assert!(tree.remove_entry::<NaturalOrder, _>(&99).is_none());
    }

    #[rstest]
    #[case(Bound::Included(20), Bound::Included(40), (1, 4))]
    #[case(Bound::Excluded(20), Bound::Excluded(40), (2, 3))]
    #[case(Bound::Included(15), Bound::Included(35), (1, 3))]
    #[case(Bound::Unbounded, Bound::Excluded(30), (0, 2))]
    #[case(Bound::Included(45), Bound::Unbounded, (4, 5))]
    #[case(Bound::Included(40), Bound::Included(20), (3, 3))]
    fn test_window_of(#[case] lower: Bound<i32>, #[case] upper: Bound<i32>, #[case] expected: (usize, usize)) {
        let tree = tree(&[10, 20, 30, 40, 50]);
        assert_eq!(tree.window_of::<NaturalOrder, i32>(lower.as_ref(), upper.as_ref()), expected);
    }

    #[rstest]
    fn test_position_of() {
        let tree = tree(&[10, 20, 30, 40, 50]);
        assert_eq!(tree.position_of::<NaturalOrder, _>(&10), Some(0));
        assert_eq!(tree.position_of::<NaturalOrder, _>(&40), Some(3));
        assert_eq!(tree.position_of::<NaturalOrder, _>(&45), None);
    }

    #[rstest]
    #[case(30, Some(20), Some(40), Some(30), Some(30))]
    #[case(35, Some(30), Some(40), Some(30), Some(40))]
    #[case(10, None, Some(20), Some(10), Some(10))]
    #[case(5, None, Some(10), None, Some(10))]
    #[case(50, Some(40), None, Some(50), Some(50))]
    #[case(99, Some(50), None, Some(50), None)]
    fn test_nearest_neighbours(
        #[case] key: i32,
        #[case] predecessor: Option<i32>,
        #[case] successor: Option<i32>,
        #[case] or_predecessor: Option<i32>,
        #[case] or_successor: Option<i32>,
    ) {
        let tree = tree(&[10, 20, 30, 40, 50]);
        assert_eq!(tree.predecessor::<NaturalOrder, _>(&key).map(|e| e.0), predecessor);
        assert_eq!(tree.successor::<NaturalOrder, _>(&key).map(|e| e.0), successor);
        assert_eq!(tree.or_predecessor::<NaturalOrder, _>(&key).map(|e| e.0), or_predecessor);
        assert_eq!(tree.or_successor::<NaturalOrder, _>(&key).map(|e| e.0), or_successor);
    }
}
