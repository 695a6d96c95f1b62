use core::ptr::NonNull;
use std::collections::VecDeque;

use crate::{Dir, Link, Links, RbTree, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the nodes of an [`RbTree`].
///
/// Walks the structure directly using the parent back-links, yielding nodes
/// in ascending key order. A finite, non-restartable single pass.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree RbTree<T>,

    front_cur: Link<T>,
    front_from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree RbTree<T>) -> Self {
        Iter {
            tree,

            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
                        cur = left;
                    }

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next. Save off the
                    // iterator state and return it.
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    // The current node was just yielded.
                    if let Some(right) = unsafe { T::links(cur).as_ref().right() } {
                        // If the right subtree is not empty, go there.
                        self.front_from = CameFrom::Parent;

                        cur = right;
                    } else if let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
                        // Otherwise, ascend one level.
                        self.front_from = match unsafe { self.tree.which_child(parent, cur) } {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };

                        cur = parent;
                    } else {
                        unreachable!()
                    }
                }

                CameFrom::RightChild => {
                    // Ascend until we move up through a left edge; that
                    // parent is the successor. `len > 0` guarantees one
                    // exists before the climb runs out of parents.
                    while let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
                        let dir = unsafe { self.tree.which_child(parent, cur) };
                        cur = parent;

                        if dir == Dir::Left {
                            break;
                        }
                    }

                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'tree, T> {}

/// A breadth-first (level order) iterator over the nodes of an [`RbTree`].
pub struct LevelOrder<'tree, T: TreeNode<Links<T>> + ?Sized> {
    _tree: &'tree RbTree<T>,
    queue: VecDeque<NonNull<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> LevelOrder<'tree, T> {
    pub(crate) fn new(tree: &'tree RbTree<T>) -> Self {
        let mut queue = VecDeque::new();

        if let Some(root) = tree.root {
            queue.push_back(root);
        }

        LevelOrder { _tree: tree, queue }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for LevelOrder<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;

        unsafe {
            if let Some(left) = T::links(node).as_ref().left() {
                self.queue.push_back(left);
            }

            if let Some(right) = T::links(node).as_ref().right() {
                self.queue.push_back(right);
            }

            Some(node.as_ref())
        }
    }
}
