use core::{borrow::Borrow, fmt, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{Keys, Links, RbTree, TreeNode};

/// An ordered collection that stores multiple keys per comparison value.
///
/// Keys comparing equal are merged into a single tree node holding an
/// insertion-ordered duplicate group, so the node count and the logical key
/// count diverge as soon as a duplicate is inserted. Iteration is ascending
/// and resumable: an optional start point, remembered across calls, makes
/// future iterations begin at the smallest key not less than it.
pub struct MultiKeyTree<K>
where
    K: Ord + fmt::Debug,
{
    tree: RbTree<GroupNode<K>>,
    num_keys: usize,
    start_point: Option<K>,
}

/// A tree node owning the duplicate-key group for one comparison value.
///
/// The group is never empty and only ever grows by appending, so the first
/// key can stand in as the node's comparison value.
pub(crate) struct GroupNode<K> {
    links: Links<GroupNode<K>>,
    keys: Vec<K>,
    _unpin: PhantomPinned,
}

impl<K> GroupNode<K> {
    fn new(key: K) -> Box<GroupNode<K>> {
        Box::new(GroupNode {
            links: Links::new(),
            keys: vec![key],
            _unpin: PhantomPinned,
        })
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }
}

unsafe impl<K> Linked<Links<GroupNode<K>>> for GroupNode<K> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<GroupNode<K>>> {
        let ptr = ptr.as_ptr();
        NonNull::new(core::ptr::addr_of_mut!((*ptr).links)).unwrap()
    }
}

impl<K: Ord + fmt::Debug> TreeNode<Links<GroupNode<K>>> for GroupNode<K> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        // A group always holds at least one key.
        &self.keys[0]
    }
}

impl<K: Ord + fmt::Debug> MultiKeyTree<K> {
    /// Creates a new, empty `MultiKeyTree`.
    pub const fn new() -> Self {
        Self {
            tree: RbTree::new(),
            num_keys: 0,
            start_point: None,
        }
    }

    /// Returns `true` if the tree contains no keys.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of distinct comparison values in the tree, i.e. the
    /// node count.
    pub const fn size(&self) -> usize {
        self.tree.len()
    }

    /// Returns the total number of keys inserted, counting duplicates
    /// individually.
    ///
    /// Always at least [`size`](Self::size), with equality iff no duplicates
    /// have been inserted.
    pub const fn num_keys(&self) -> usize {
        self.num_keys
    }

    /// Returns `true` if the tree contains a key comparing equal to `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Inserts `key` into the tree.
    ///
    /// If no node compares equal to `key`, a new single-key group is inserted
    /// through the balancing insert path and `true` is returned. Otherwise
    /// `key` is appended to the existing group, the tree shape is untouched,
    /// and `false` is returned. Either way the logical key count grows by one.
    pub fn insert_key(&mut self, key: K) -> bool {
        self.num_keys += 1;

        if let Some(group) = self.tree.get_mut(&key) {
            // Appending an equal key never reorders the node relative to its
            // neighbors, so the balancing pass is skipped entirely.
            //
            // SAFETY: pinning is not structural for `keys`.
            unsafe { group.get_unchecked_mut() }.keys.push(key);
            return false;
        }

        let rejected = self.tree.insert(GroupNode::new(key));
        debug_assert!(rejected.is_none(), "lookup and insert disagree");
        true
    }

    /// Sets the starting point for iterations.
    ///
    /// Future iterations will begin at the smallest key not less than
    /// `start_point`, which need not itself be present in the tree. The
    /// setting is remembered until it is changed; passing `None` restores
    /// full ascending iteration.
    pub fn set_iteration_start_point(&mut self, start_point: Option<K>) {
        self.start_point = start_point;
    }

    /// Removes all keys from the tree and clears the iteration start point.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.num_keys = 0;
        self.start_point = None;
    }

    /// Returns an ascending iterator over all keys, honoring the iteration
    /// start point if one is set.
    ///
    /// Duplicates are yielded once per occurrence, in insertion order within
    /// their group.
    pub fn iter(&self) -> Keys<'_, K> {
        Keys::with_start(&self.tree, self.start_point.as_ref())
    }

    pub(crate) fn keys_from<'tree>(&'tree self, start: Option<&K>) -> Keys<'tree, K> {
        Keys::with_start(&self.tree, start)
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();

        assert!(
            self.tree.len() <= self.num_keys,
            "node count exceeds logical key count"
        );

        let mut total = 0;
        for group in self.tree.iter() {
            let first = group
                .keys
                .first()
                .expect("a duplicate-key group cannot be empty");
            assert!(
                group.keys.iter().all(|k| k == first),
                "group for {first:?} holds unequal keys"
            );
            total += group.keys.len();
        }

        assert_eq!(total, self.num_keys, "logical key count out of sync");
    }
}

impl<K: Ord + fmt::Debug> Default for MultiKeyTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'tree, K: Ord + fmt::Debug> IntoIterator for &'tree MultiKeyTree<K> {
    type Item = &'tree K;
    type IntoIter = Keys<'tree, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
