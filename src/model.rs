//! Test model shared by the property tests and the fuzz targets.
//!
//! Runs randomized operation sequences against a [`MultiKeyTree`] and a
//! sorted `Vec` multiset side by side, checking membership, both key counts,
//! the structural invariants, and the full iteration sequence (honoring the
//! current start point) after every operation.

use core::ptr::NonNull;

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{Error, Links, MultiKeyTree, TreeNode};

/// A minimal node type for exercising the core tree directly.
#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub(crate) fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    /// Picks a key already in the tree, making duplicates and hits likely.
    Index(usize),
    /// An arbitrary key, present or not.
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    InsertKey(ItemValue),
    Contains(ItemValue),
    SetStartPoint(ItemValue),
    ClearStartPoint,
    Clear,
}

impl Op {
    fn finalize(self, keys: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len().max(1)]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::InsertKey(item) => FinalOp::InsertKey(get_value(keys, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(keys, item)),
            Op::SetStartPoint(item) => FinalOp::SetStartPoint(get_value(keys, item)),
            Op::ClearStartPoint => FinalOp::ClearStartPoint,
            Op::Clear => FinalOp::Clear,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    InsertKey(u32),
    Contains(u32),
    SetStartPoint(u32),
    ClearStartPoint,
    Clear,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        5 => value_strategy().prop_map(Op::InsertKey),
        2 => value_strategy().prop_map(Op::Contains),
        1 => value_strategy().prop_map(Op::SetStartPoint),
        1 => Just(Op::ClearStartPoint),
        1 => Just(Op::Clear),
    ]
}

pub fn run_multiset_equivalence(ops: Vec<Op>) {
    // The model: a sorted multiset of every inserted key, plus the current
    // start point.
    let mut keys: Vec<u32> = Vec::new();
    let mut start: Option<u32> = None;

    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        match op.finalize(&keys) {
            FinalOp::InsertKey(value) => {
                let existed = keys.binary_search(&value).is_ok();
                let idx = keys.partition_point(|&k| k <= value);
                keys.insert(idx, value);

                let created = tree.insert_key(value);
                assert_eq!(created, !existed, "Op #{op_id}: {op:?}");
            }

            FinalOp::Contains(value) => {
                let in_model = keys.binary_search(&value).is_ok();
                assert_eq!(tree.contains(&value), in_model, "Op #{op_id}: {op:?}");
            }

            FinalOp::SetStartPoint(value) => {
                start = Some(value);
                tree.set_iteration_start_point(Some(value));
            }

            FinalOp::ClearStartPoint => {
                start = None;
                tree.set_iteration_start_point(None);
            }

            FinalOp::Clear => {
                keys.clear();
                start = None;
                tree.clear();
            }
        }

        tree.assert_invariants();

        assert_eq!(tree.num_keys(), keys.len(), "Op #{op_id}: {op:?}");

        let distinct = keys
            .iter()
            .zip(keys.iter().skip(1))
            .filter(|(a, b)| a != b)
            .count()
            + usize::from(!keys.is_empty());
        assert_eq!(tree.size(), distinct, "Op #{op_id}: {op:?}");

        let expected: Vec<u32> = match start {
            Some(s) => keys.iter().copied().filter(|&k| k >= s).collect(),
            None => keys.clone(),
        };

        // Step the iterator through the has_next/try_next protocol rather
        // than collecting, so exhaustion is exercised on every sequence.
        let mut it = tree.iter();
        for want in &expected {
            assert!(it.has_next(), "Op #{op_id}: {op:?}");
            assert_eq!(it.try_next(), Ok(want), "Op #{op_id}: {op:?}");
        }
        assert!(!it.has_next(), "Op #{op_id}: {op:?}");
        assert_eq!(it.try_next(), Err(Error::Exhausted), "Op #{op_id}: {op:?}");
    }
}
