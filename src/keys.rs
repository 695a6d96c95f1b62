use core::{fmt, marker::PhantomData, ptr::NonNull, slice};

use cordyceps::Linked;

use crate::multikey::GroupNode;
use crate::{Error, RbTree};

/// A resumable ascending iterator over the keys of a
/// [`MultiKeyTree`](crate::MultiKeyTree).
///
/// Yields every key in non-decreasing order, duplicates included, each in its
/// insertion position within its group. The iterator owns its traversal
/// state: a stack holding the rightward frontier of nodes still to visit,
/// and a cursor over the current node's duplicate group.
///
/// The borrow on the tree makes mutation during iteration a compile error.
pub struct Keys<'tree, K>
where
    K: Ord + fmt::Debug,
{
    stack: Vec<NonNull<GroupNode<K>>>,
    group: slice::Iter<'tree, K>,
    _tree: PhantomData<&'tree RbTree<GroupNode<K>>>,
}

impl<'tree, K> Keys<'tree, K>
where
    K: Ord + fmt::Debug,
{
    // Seeds the stack for iteration from `start`.
    //
    // With no start point, the stack holds the path from the root down to
    // the minimum node. With a start point, the descent pushes every node
    // whose comparison value is >= `start` before continuing left (smaller
    // keys still >= `start` may live there), and skips into the right
    // subtree without pushing whenever a node's value is < `start`.
    pub(crate) fn with_start(tree: &'tree RbTree<GroupNode<K>>, start: Option<&K>) -> Self {
        let mut stack = Vec::new();
        let mut cur = tree.root;

        unsafe {
            while let Some(node) = cur {
                let links = GroupNode::links(node);

                match start {
                    Some(start) if *start > node.as_ref().keys()[0] => {
                        cur = links.as_ref().right();
                    }
                    _ => {
                        stack.push(node);
                        cur = links.as_ref().left();
                    }
                }
            }
        }

        Keys {
            stack,
            group: (&[] as &[K]).iter(),
            _tree: PhantomData,
        }
    }

    /// Returns `true` if the iteration has more keys.
    pub fn has_next(&self) -> bool {
        !self.stack.is_empty() || !self.group.as_slice().is_empty()
    }

    /// Returns the next key, or [`Error::Exhausted`] if the iteration is
    /// over.
    ///
    /// The `Iterator` impl is usually more convenient; this exists for
    /// callers pairing it with [`has_next`](Self::has_next).
    pub fn try_next(&mut self) -> Result<&'tree K, Error> {
        self.next().ok_or(Error::Exhausted)
    }
}

impl<'tree, K> Iterator for Keys<'tree, K>
where
    K: Ord + fmt::Debug,
{
    type Item = &'tree K;

    fn next(&mut self) -> Option<Self::Item> {
        // First exhaust the current group's cursor.
        if let Some(key) = self.group.next() {
            return Some(key);
        }

        let node = self.stack.pop()?;

        unsafe {
            let node_ref: &'tree GroupNode<K> = node.as_ref();
            self.group = node_ref.keys().iter();

            // Push the popped node's right child and that child's whole
            // leftward spine, so the smallest keys not yet seen in that
            // subtree are visited next.
            let mut cur = GroupNode::links(node).as_ref().right();
            while let Some(next) = cur {
                self.stack.push(next);
                cur = GroupNode::links(next).as_ref().left();
            }
        }

        // A group is never empty, so the fresh cursor yields a key.
        self.group.next()
    }
}
