use core::ptr::NonNull;
use std::ops::Range;

use cordyceps::Linked;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn levelorder_keys(tree: &RbTree<TestNode>) -> Vec<u32> {
    tree.levelorder().map(|node| node.key).collect()
}

fn inorder_keys(tree: &RbTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn raw(tree: &RbTree<TestNode>, key: u32) -> NonNull<TestNode> {
    tree.get_raw(&key).expect("node not found")
}

fn color(node: NonNull<TestNode>) -> Color {
    unsafe { TestNode::links(node).as_ref().color() }
}

fn left(node: NonNull<TestNode>) -> Option<NonNull<TestNode>> {
    unsafe { TestNode::links(node).as_ref().left() }
}

fn right(node: NonNull<TestNode>) -> Option<NonNull<TestNode>> {
    unsafe { TestNode::links(node).as_ref().right() }
}

fn tree_of(keys: &[u32]) -> RbTree<TestNode> {
    let mut tree: RbTree<TestNode> = RbTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    // The ascending traversal must see every distinct key in sorted order.
    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(inorder_keys(&tree), sorted);
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

#[test]
fn inorder_ascends_through_right_edges() {
    // 1 is a left child reached after exhausting 0's empty right subtree;
    // the successor climb must move up through the left edge into 2, not
    // revisit the nodes below it.
    let tree = tree_of(&[0, 2, 3, 1]);
    assert_eq!(inorder_keys(&tree), vec![0, 1, 2, 3]);
}

#[test]
fn node_debug_output() {
    let node = TestNode::new(7);
    let rendered = format!("{node:?}");

    assert!(rendered.contains("key: 7"));
    assert!(rendered.contains("color: Red"));
}

#[test]
fn duplicate_insert_hands_back_handle() {
    let mut tree = tree_of(&[3, 1, 4]);

    let rejected = tree.insert(TestNode::new(1)).expect("duplicate accepted");
    assert_eq!(rejected.key, 1);

    assert_eq!(tree.len(), 3);
    tree.assert_invariants();
}

#[test]
fn clear_empties_tree() {
    let mut tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);

    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(inorder_keys(&tree), Vec::<u32>::new());

    // The tree is usable again afterwards.
    tree.insert(TestNode::new(2));
    tree.assert_invariants();
    assert_eq!(inorder_keys(&tree), vec![2]);
}

// Rotation ===================================================================

#[test]
fn rotate_left_mid_tree() {
    let mut tree = tree_of(&[8, 4, 11, 2, 6, 9, 12, 1, 5, 7]);
    assert_eq!(levelorder_keys(&tree), vec![8, 4, 11, 2, 6, 9, 12, 1, 5, 7]);

    let six = raw(&tree, 6);
    let four = raw(&tree, 4);
    unsafe { tree.rotate(six, four) }.expect("related nodes");

    assert_eq!(levelorder_keys(&tree), vec![8, 6, 11, 4, 7, 9, 12, 2, 5, 1]);
    // Rotation must preserve the in-order key sequence.
    assert_eq!(inorder_keys(&tree), vec![1, 2, 4, 5, 6, 7, 8, 9, 11, 12]);
}

#[test]
fn rotate_back_restores_structure() {
    let mut tree = tree_of(&[8, 4, 11, 2, 6, 9, 12, 1, 5, 7]);
    let before = levelorder_keys(&tree);

    let six = raw(&tree, 6);
    let four = raw(&tree, 4);
    unsafe { tree.rotate(six, four) }.expect("related nodes");
    // The roles are now reversed: 4 is the child of 6.
    unsafe { tree.rotate(four, six) }.expect("related nodes");

    assert_eq!(levelorder_keys(&tree), before);
}

#[test]
fn rotate_at_root() {
    let mut tree = tree_of(&[8, 4, 11, 2, 6, 9, 12, 1, 5, 7]);

    let eight = raw(&tree, 8);
    let four = raw(&tree, 4);
    unsafe { tree.rotate(four, eight) }.expect("related nodes");

    // 4 takes the root position.
    assert_eq!(
        levelorder_keys(&tree),
        vec![4, 2, 8, 1, 6, 11, 5, 7, 9, 12]
    );
    assert_eq!(inorder_keys(&tree), vec![1, 2, 4, 5, 6, 7, 8, 9, 11, 12]);
}

#[test]
fn rotate_unrelated_nodes_errors() {
    let mut tree = tree_of(&[2, 1, 4, 3, 6, 5, 7]);
    let before = levelorder_keys(&tree);

    let seven = raw(&tree, 7);
    let two = raw(&tree, 2);
    assert_eq!(
        unsafe { tree.rotate(seven, two) },
        Err(Error::UnrelatedNodes)
    );

    // A failed rotation must leave the tree untouched.
    assert_eq!(levelorder_keys(&tree), before);
    tree.assert_invariants();
}

// Rebalancing ================================================================

#[test]
fn red_uncle_recolors() {
    let mut tree: RbTree<TestNode> = RbTree::new();

    tree.insert(TestNode::new(54));
    // A lone root is black.
    assert_eq!(color(raw(&tree, 54)), Color::Black);

    tree.insert(TestNode::new(40));
    // A freshly attached leaf is red.
    assert_eq!(color(raw(&tree, 40)), Color::Red);

    tree.insert(TestNode::new(70));
    tree.insert(TestNode::new(32));
    // The red uncle case recolors both children of the root black.
    assert_eq!(color(raw(&tree, 40)), Color::Black);
    assert_eq!(color(raw(&tree, 70)), Color::Black);
    assert_eq!(color(raw(&tree, 32)), Color::Red);

    tree.insert(TestNode::new(49));
    tree.insert(TestNode::new(59));
    tree.insert(TestNode::new(78));
    tree.insert(TestNode::new(62));

    assert_eq!(
        levelorder_keys(&tree),
        vec![54, 40, 70, 32, 49, 59, 78, 62]
    );
    // Inserting 62 under the red 59 recolored 59 and 78 black and 70 red.
    assert_eq!(color(raw(&tree, 54)), Color::Black);
    assert_eq!(color(raw(&tree, 70)), Color::Red);
    assert_eq!(color(raw(&tree, 59)), Color::Black);
    tree.assert_invariants();
}

#[test]
fn black_uncle_same_side() {
    let tree = tree_of(&[54, 40, 70, 32, 49, 59, 78, 62, 65]);

    // Inserting 65 extends the right spine under 59, resolved by a
    // recolor and a single rotation that lifts 62 over 59.
    assert_eq!(
        levelorder_keys(&tree),
        vec![54, 40, 70, 32, 49, 62, 78, 59, 65]
    );
    assert_eq!(color(raw(&tree, 62)), Color::Black);
    assert_eq!(color(raw(&tree, 59)), Color::Red);
    assert_eq!(color(raw(&tree, 65)), Color::Red);
}

#[test]
fn black_uncle_opposite_side() {
    let tree = tree_of(&[54, 40, 70, 32, 49, 59, 78, 45, 47]);

    // Inserting 47 forms a zig-zag under 49/45, resolved by a double
    // rotation that lifts 47 between them.
    assert_eq!(
        levelorder_keys(&tree),
        vec![54, 40, 70, 32, 47, 59, 78, 45, 49]
    );
    assert_eq!(color(raw(&tree, 47)), Color::Black);
    assert_eq!(color(raw(&tree, 45)), Color::Red);
    assert_eq!(color(raw(&tree, 49)), Color::Red);
}

#[test]
fn ascending_inserts_rebalance() {
    let mut tree: RbTree<TestNode> = RbTree::new();

    for key in 1..=8 {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    // After 1..=8, repeated fixups have moved 4 to the root.
    let four = raw(&tree, 4);
    assert_eq!(levelorder_keys(&tree)[0], 4);
    assert_eq!(left(four).map(|n| unsafe { n.as_ref().key }), Some(2));
    assert_eq!(right(four).map(|n| unsafe { n.as_ref().key }), Some(6));
    assert_eq!(color(four), Color::Black);
    assert_eq!(color(raw(&tree, 2)), Color::Red);
    assert_eq!(color(raw(&tree, 6)), Color::Red);

    tree.insert(TestNode::new(9));
    assert_eq!(levelorder_keys(&tree), vec![4, 2, 6, 1, 3, 5, 8, 7, 9]);
    assert_eq!(color(raw(&tree, 5)), Color::Black);
    assert_eq!(color(raw(&tree, 8)), Color::Black);
    assert_eq!(color(raw(&tree, 9)), Color::Red);
    tree.assert_invariants();
}

// Multi-key layer ============================================================

#[test]
fn empty_tree_iterates_nothing() {
    let tree: MultiKeyTree<u32> = MultiKeyTree::new();

    assert!(tree.is_empty());
    assert!(!tree.iter().has_next());
    assert_eq!(tree.iter().next(), None);
    assert_eq!(tree.iter().try_next(), Err(Error::Exhausted));
}

#[test]
fn duplicate_keys_share_a_node() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [144, 144, 299, 299, 722, 823, 824, 930] {
        tree.insert_key(key);
        tree.assert_invariants();
    }

    // Duplicates merged into shared nodes; the rest have distinct nodes.
    assert_eq!(tree.size(), 6);
    assert_eq!(tree.num_keys(), 8);

    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![144, 144, 299, 299, 722, 823, 824, 930]);
}

#[test]
fn single_group_holds_all_duplicates() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    assert!(tree.insert_key(144));
    assert!(!tree.insert_key(144));
    assert!(!tree.insert_key(144));
    assert!(!tree.insert_key(144));

    assert_eq!(tree.size(), 1);
    assert_eq!(tree.num_keys(), 4);

    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![144, 144, 144, 144]);
}

#[test]
fn iteration_is_sorted() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [1440, 9320, 2990, 6350, 1440, 72340, 100, 1449] {
        tree.insert_key(key);
    }
    tree.assert_invariants();

    assert_eq!(tree.num_keys(), 8);

    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![100, 1440, 1440, 1449, 2990, 6350, 9320, 72340]);

    // A fresh iterator yields the identical sequence.
    let again: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(again, keys);
}

#[test]
fn contains_reports_membership() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [5, 3, 9, 3] {
        tree.insert_key(key);
    }

    assert!(tree.contains(&3));
    assert!(tree.contains(&9));
    assert!(!tree.contains(&4));
}

#[test]
fn start_point_resumes_iteration() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [239, 9423, 888, 534, 888, 534, 1218, 8311] {
        tree.insert_key(key);
    }

    // A start point absent from the tree resumes at the next largest key.
    tree.set_iteration_start_point(Some(240));
    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![534, 534, 888, 888, 1218, 8311, 9423]);

    // A start point present in the tree starts exactly there.
    tree.set_iteration_start_point(Some(888));
    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![888, 888, 1218, 8311, 9423]);

    // Resetting restores full ascending iteration.
    tree.set_iteration_start_point(None);
    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![239, 534, 534, 888, 888, 1218, 8311, 9423]);
}

#[test]
fn start_point_past_maximum_is_empty() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [10, 20, 30] {
        tree.insert_key(key);
    }

    tree.set_iteration_start_point(Some(31));

    let mut it = tree.iter();
    assert!(!it.has_next());
    assert_eq!(it.next(), None);
    assert_eq!(it.try_next(), Err(Error::Exhausted));
}

#[test]
fn lockstep_iterators_see_identical_sequences() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [50, 50, 100, 100, 150, 150] {
        tree.insert_key(key);
    }

    assert_eq!(tree.size(), 3);
    assert_eq!(tree.num_keys(), 6);

    let mut it = tree.iter();
    let mut it2 = tree.iter();

    for want in [50u32, 50, 100, 100, 150, 150] {
        assert!(it.has_next());
        assert!(it2.has_next());
        assert_eq!(it.next().copied(), Some(want));
        assert_eq!(it2.next().copied(), Some(want));
    }

    assert!(!it.has_next());
    assert!(!it2.has_next());
    assert_eq!(it.try_next(), Err(Error::Exhausted));
    assert_eq!(it2.try_next(), Err(Error::Exhausted));
}

#[test]
fn bulk_triplicates() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in 0..300 {
        tree.insert_key(key);
        tree.insert_key(key);
        tree.insert_key(key);
    }
    tree.assert_invariants();

    assert_eq!(tree.size(), 300);
    assert_eq!(tree.num_keys(), 900);

    let keys: Vec<u32> = tree.iter().copied().collect();
    let expected: Vec<u32> = (0..300).flat_map(|k| [k, k, k]).collect();
    assert_eq!(keys, expected);
}

#[test]
fn clear_resets_counts_and_start_point() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [7, 7, 3, 9] {
        tree.insert_key(key);
    }
    tree.set_iteration_start_point(Some(8));

    tree.clear();

    assert!(tree.is_empty());
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.num_keys(), 0);
    assert!(!tree.iter().has_next());

    // The start point was cleared along with the keys.
    tree.insert_key(5);
    let keys: Vec<u32> = tree.iter().copied().collect();
    assert_eq!(keys, vec![5]);
}

#[test]
fn debug_formats_key_sequence() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for key in [2, 1, 2] {
        tree.insert_key(key);
    }

    // Debug output ignores any stored start point.
    tree.set_iteration_start_point(Some(2));
    assert_eq!(format!("{tree:?}"), "[1, 2, 2]");
}

// Model ======================================================================

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn multiset_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_multiset_equivalence(ops);
    }
}
