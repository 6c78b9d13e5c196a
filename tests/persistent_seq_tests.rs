//! Unit tests for PersistentSeq.
//!
//! Exercises the public positional API, including reversed views,
//! windowed enumeration and structural sharing between versions.

use persistent_avl::persistent::{PersistentSeq, TreeError};
use rstest::rstest;

fn collect(sequence: &PersistentSeq<i32>) -> Vec<i32> {
    sequence.iter().copied().collect()
}

// =============================================================================
// Basic Construction Tests
// =============================================================================

#[rstest]
fn test_new_creates_empty_sequence() {
    let sequence: PersistentSeq<i32> = PersistentSeq::new();
    assert!(sequence.is_empty());
    assert_eq!(sequence.len(), 0);
    assert_eq!(sequence.first(), None);
    assert_eq!(sequence.last(), None);
}

#[rstest]
fn test_default_creates_empty_sequence() {
    let sequence: PersistentSeq<String> = PersistentSeq::default();
    assert!(sequence.is_empty());
}

#[rstest]
fn test_singleton_creates_sequence_with_one_element() {
    let sequence = PersistentSeq::singleton("only".to_string());
    assert_eq!(sequence.len(), 1);
    assert_eq!(sequence.get(0), Some(&"only".to_string()));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(7)]
#[case(100)]
#[case(1023)]
fn test_from_ordered_builds_balanced_tree(#[case] size: i32) {
    let sequence = PersistentSeq::from_ordered(0..size);
    assert!(sequence.is_balanced());
    assert_eq!(collect(&sequence), (0..size).collect::<Vec<_>>());
}

// =============================================================================
// Positional Update Tests
// =============================================================================

#[rstest]
fn test_push_back_and_push_front() {
    let sequence = PersistentSeq::new().push_back(2).push_back(3).push_front(1);
    assert_eq!(collect(&sequence), vec![1, 2, 3]);
}

#[rstest]
fn test_insert_into_middle_preserves_original() {
    let original: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
    let inserted = original.insert(2, 99).unwrap();

    assert_eq!(collect(&original), vec![10, 20, 30, 40, 50]);
    assert_eq!(collect(&inserted), vec![10, 20, 99, 30, 40, 50]);
    assert!(inserted.is_balanced());
}

#[rstest]
#[case(0, vec![0, 1, 2, 3])]
#[case(3, vec![1, 2, 3, 0])]
fn test_insert_at_boundaries(#[case] index: usize, #[case] expected: Vec<i32>) {
    let sequence: PersistentSeq<i32> = (1..=3).collect();
    assert_eq!(collect(&sequence.insert(index, 0).unwrap()), expected);
}

#[rstest]
fn test_insert_past_end_fails() {
    let sequence: PersistentSeq<i32> = (1..=3).collect();
    assert_eq!(
        sequence.insert(4, 0),
        Err(TreeError::InsertOutOfRange { index: 4, length: 3 })
    );
}

#[rstest]
fn test_insert_range_splices_in_order() {
    let sequence: PersistentSeq<i32> = [1, 5].into_iter().collect();
    let spliced = sequence.insert_range(1, [2, 3, 4]).unwrap();
    assert_eq!(collect(&spliced), vec![1, 2, 3, 4, 5]);
    assert!(spliced.is_balanced());
}

#[rstest]
fn test_insert_range_into_large_sequence_stays_balanced() {
    let sequence: PersistentSeq<i32> = (0..1000).collect();
    let spliced = sequence.insert_range(10, 5000..5003).unwrap();
    assert_eq!(spliced.len(), 1003);
    assert_eq!(spliced.get(10), Some(&5000));
    assert_eq!(spliced.get(13), Some(&10));
    assert!(spliced.is_balanced());
}

#[rstest]
fn test_remove_at_every_position_keeps_balance() {
    let sequence: PersistentSeq<i32> = (0..64).collect();
    for index in 0..64 {
        let removed = sequence.remove_at(index).unwrap();
        assert_eq!(removed.len(), 63);
        assert!(removed.is_balanced());
        let expected: Vec<i32> = (0..64).filter(|value| *value != index as i32).collect();
        assert_eq!(collect(&removed), expected);
    }
}

#[rstest]
fn test_remove_at_out_of_range_fails() {
    let sequence: PersistentSeq<i32> = PersistentSeq::new();
    assert_eq!(
        sequence.remove_at(0),
        Err(TreeError::IndexOutOfRange { index: 0, length: 0 })
    );
}

#[rstest]
fn test_remove_range_removes_window() {
    let sequence: PersistentSeq<i32> = (0..10).collect();
    let removed = sequence.remove_range(2, 5).unwrap();
    assert_eq!(collect(&removed), vec![0, 1, 7, 8, 9]);
    assert!(removed.is_balanced());
}

#[rstest]
fn test_remove_range_empty_window_returns_same_version() {
    let sequence: PersistentSeq<i32> = (0..10).collect();
    assert!(sequence.remove_range(4, 0).unwrap().ptr_eq(&sequence));
}

#[rstest]
fn test_remove_range_past_end_fails() {
    let sequence: PersistentSeq<i32> = (0..10).collect();
    assert_eq!(
        sequence.remove_range(8, 3),
        Err(TreeError::RangeOutOfBounds { start: 8, count: 3, length: 10 })
    );
}

#[rstest]
fn test_set_item_and_update() {
    let sequence: PersistentSeq<i32> = (1..=5).collect();
    let replaced = sequence.set_item(4, 50).unwrap();
    let updated = replaced.update(0, |value| value - 1).unwrap();

    assert_eq!(collect(&sequence), vec![1, 2, 3, 4, 5]);
    assert_eq!(collect(&updated), vec![0, 2, 3, 4, 50]);
    assert!(sequence.set_item(5, 0).is_err());
}

#[rstest]
fn test_append_joins_sequences() {
    let left: PersistentSeq<i32> = (0..100).collect();
    let right: PersistentSeq<i32> = (100..103).collect();
    let joined = left.append(&right);

    assert_eq!(collect(&joined), (0..103).collect::<Vec<_>>());
    assert!(joined.is_balanced());
}

#[rstest]
fn test_append_with_empty_sides() {
    let empty: PersistentSeq<i32> = PersistentSeq::new();
    let sequence: PersistentSeq<i32> = (0..3).collect();
    assert_eq!(empty.append(&sequence), sequence);
    assert_eq!(sequence.append(&empty), sequence);
}

#[rstest]
#[case(0, vec![0, 1, 2, 3, 4])]
#[case(2, vec![2, 3, 4])]
#[case(5, vec![])]
#[case(9, vec![])]
fn test_skip(#[case] amount: usize, #[case] expected: Vec<i32>) {
    let sequence: PersistentSeq<i32> = (0..5).collect();
    assert_eq!(collect(&sequence.skip(amount)), expected);
}

#[rstest]
#[case(0, vec![])]
#[case(2, vec![0, 1])]
#[case(9, vec![0, 1, 2, 3, 4])]
fn test_take(#[case] amount: usize, #[case] expected: Vec<i32>) {
    let sequence: PersistentSeq<i32> = (0..5).collect();
    assert_eq!(collect(&sequence.take(amount)), expected);
}

#[rstest]
fn test_map_and_filter() {
    let sequence: PersistentSeq<i32> = (1..=6).collect();
    let doubled = sequence.map(|value| value * 2);
    let evens = sequence.filter(|value| value % 2 == 0);

    assert_eq!(doubled.iter().copied().collect::<Vec<_>>(), vec![2, 4, 6, 8, 10, 12]);
    assert_eq!(collect(&evens), vec![2, 4, 6]);
}

// =============================================================================
// Reversed View Tests
// =============================================================================

#[rstest]
fn test_reverse_is_logical_view() {
    let sequence: PersistentSeq<i32> = (1..=5).collect();
    let reversed = sequence.reverse();

    assert!(reversed.is_reversed());
    assert_eq!(collect(&reversed), vec![5, 4, 3, 2, 1]);
    assert_eq!(reversed.first(), Some(&5));
    assert_eq!(reversed.last(), Some(&1));
    assert_eq!(reversed.reverse(), sequence);
}

#[rstest]
fn test_reversed_positional_updates() {
    let reversed: PersistentSeq<i32> = (1..=5).collect::<PersistentSeq<i32>>().reverse();

    let inserted = reversed.insert(1, 0).unwrap();
    assert_eq!(collect(&inserted), vec![5, 0, 4, 3, 2, 1]);

    let removed = reversed.remove_range(1, 2).unwrap();
    assert_eq!(collect(&removed), vec![5, 2, 1]);

    assert_eq!(collect(&reversed.push_back(0)), vec![5, 4, 3, 2, 1, 0]);
    assert_eq!(collect(&reversed.push_front(6)), vec![6, 5, 4, 3, 2, 1]);
    assert_eq!(collect(&reversed.skip(2)), vec![3, 2, 1]);
    assert_eq!(collect(&reversed.take(2)), vec![5, 4]);
    assert_eq!(collect(&reversed.insert_range(5, [0, -1]).unwrap()), vec![5, 4, 3, 2, 1, 0, -1]);
}

#[rstest]
fn test_append_mixed_directions() {
    let forward: PersistentSeq<i32> = (1..=3).collect();
    let backward = forward.reverse();

    assert_eq!(collect(&forward.append(&backward)), vec![1, 2, 3, 3, 2, 1]);
    assert_eq!(collect(&backward.append(&forward)), vec![3, 2, 1, 1, 2, 3]);
    assert_eq!(collect(&backward.append(&backward)), vec![3, 2, 1, 3, 2, 1]);
}

// =============================================================================
// Search Tests
// =============================================================================

#[rstest]
#[case(40, Ok(3))]
#[case(35, Err(3))]
#[case(5, Err(0))]
#[case(60, Err(5))]
fn test_binary_search(#[case] target: i32, #[case] expected: Result<usize, usize>) {
    let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
    assert_eq!(sequence.binary_search(&target), expected);
}

#[rstest]
fn test_search_within_window() {
    let sequence: PersistentSeq<i32> = [10, 20, 30, 40, 50].into_iter().collect();
    assert_eq!(sequence.search(&20, 2, 3, i32::cmp), Ok(Err(2)));
    assert_eq!(sequence.search(&50, 2, 3, i32::cmp), Ok(Ok(4)));
    assert!(sequence.search(&50, 3, 3, i32::cmp).is_err());
}

#[rstest]
fn test_search_on_reversed_descending_view() {
    let reversed = [10, 20, 30, 40, 50].into_iter().collect::<PersistentSeq<i32>>().reverse();
    let descending = |element: &i32, value: &i32| value.cmp(element);

    assert_eq!(reversed.search(&40, 0, 5, descending), Ok(Ok(1)));
    assert_eq!(reversed.search(&35, 0, 5, descending), Ok(Err(2)));
}

#[rstest]
fn test_index_of() {
    let sequence: PersistentSeq<char> = "persistent".chars().collect();
    assert_eq!(sequence.index_of(&'s'), Some(3));
    assert_eq!(sequence.index_of(&'z'), None);
}

// =============================================================================
// Enumeration Tests
// =============================================================================

#[rstest]
fn test_find_range_yields_window() {
    let sequence: PersistentSeq<i32> = (0..100).collect();
    let window: Vec<i32> = sequence.find_range(40, 5).unwrap().copied().collect();
    assert_eq!(window, vec![40, 41, 42, 43, 44]);
}

#[rstest]
fn test_iter_window_is_clipped() {
    let sequence: PersistentSeq<i32> = (0..10).collect();
    assert_eq!(sequence.iter_window(8, 10).copied().collect::<Vec<_>>(), vec![8, 9]);
    assert_eq!(sequence.iter_window(12, 3).count(), 0);
}

#[rstest]
fn test_enumerator_survives_original_handle() {
    let enumerator = {
        let sequence: PersistentSeq<i32> = (0..5).collect();
        sequence.enumerator(1, 3)
    };
    assert_eq!(enumerator.collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[rstest]
fn test_enumerator_reset_restarts_window() {
    let sequence: PersistentSeq<i32> = (0..10).collect();
    let mut enumerator = sequence.enumerator(0, 3);
    assert_eq!(enumerator.next(), Some(0));
    enumerator.reset(5);
    assert_eq!(enumerator.collect::<Vec<_>>(), vec![5, 6, 7]);
}

#[rstest]
fn test_enumerator_stacks_return_to_shared_pool() {
    let sequence: PersistentSeq<i32> = (0..100).collect();
    let derived = sequence.push_back(100);
    assert_eq!(sequence.pooled_stacks(), 0);

    drop(derived.enumerator(0, 10));
    assert_eq!(sequence.pooled_stacks(), 1);

    let first = sequence.enumerator(0, 1);
    assert_eq!(derived.pooled_stacks(), 0);
    drop(first);
    assert_eq!(derived.pooled_stacks(), 1);
}

#[rstest]
fn test_into_iter_owns_elements() {
    let sequence: PersistentSeq<String> = ["a", "b"].into_iter().map(String::from).collect();
    let owned: Vec<String> = sequence.into_iter().collect();
    assert_eq!(owned, vec!["a".to_string(), "b".to_string()]);
}

// =============================================================================
// Equality, Hashing and Display Tests
// =============================================================================

#[rstest]
fn test_equality_ignores_shape() {
    let built: PersistentSeq<i32> = (0..50).collect();
    let pushed = (0..50).fold(PersistentSeq::new(), |sequence, value| sequence.push_back(value));
    assert_eq!(built, pushed);
    assert_eq!(built.structural_hash(), pushed.structural_hash());
}

#[rstest]
fn test_empty_sequence_hash_is_zero() {
    let sequence: PersistentSeq<i32> = PersistentSeq::new();
    assert_eq!(sequence.structural_hash(), 0);
}

#[rstest]
fn test_hash_is_order_sensitive() {
    let forward: PersistentSeq<i32> = (1..=3).collect();
    assert_ne!(forward.structural_hash(), forward.reverse().structural_hash());
    assert_ne!(forward, forward.reverse());
}

#[rstest]
fn test_ordering_is_lexicographic() {
    let shorter: PersistentSeq<i32> = [1, 2].into_iter().collect();
    let longer: PersistentSeq<i32> = [1, 2, 0].into_iter().collect();
    let larger: PersistentSeq<i32> = [1, 3].into_iter().collect();
    assert!(shorter < longer);
    assert!(longer < larger);
}

#[rstest]
fn test_display_and_debug() {
    let sequence: PersistentSeq<i32> = (1..=3).collect();
    assert_eq!(sequence.to_string(), "[1, 2, 3]");
    assert_eq!(format!("{sequence:?}"), "[1, 2, 3]");
    assert_eq!(PersistentSeq::<i32>::new().to_string(), "[]");
}

// =============================================================================
// Structural Sharing Tests
// =============================================================================

#[rstest]
fn test_many_versions_stay_independent() {
    let base: PersistentSeq<i32> = (0..20).collect();
    let versions: Vec<PersistentSeq<i32>> = (0..20)
        .map(|index| base.set_item(index, -1).unwrap())
        .collect();

    for (index, version) in versions.iter().enumerate() {
        assert_eq!(version.get(index), Some(&-1));
        assert_eq!(version.iter().filter(|value| **value == -1).count(), 1);
    }
    assert_eq!(collect(&base), (0..20).collect::<Vec<_>>());
}
