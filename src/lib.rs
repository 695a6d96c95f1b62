//! An intrusive red-black tree and an ordered multi-key collection built on it.
//!
//! [`RbTree`] is the balanced-tree substrate: ordered insertion, structural
//! rotation, and the post-insert fixup that restores the red-black
//! invariants. [`MultiKeyTree`] wraps it so that keys comparing equal share
//! one node, and exposes a resumable ascending iterator over all keys.

// Invariants maintained by the tree:
// 1. For every node, all keys in the left subtree compare less than the
//    node's key, and all keys in the right subtree compare greater.
// 2. A red node never has a red child.
// 3. Every path from a node to any absent-child slot beneath it passes
//    through the same number of black nodes (the node's black-height).
// 4. The root is black.
//
// (2)-(4) bound the tree height at twice the shortest root-to-leaf path, so
// insertion, lookup and rotation are all O(log n).
//
// There is no remove operation; the fixup protocol below only restores the
// invariants after insertion.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod debug;
mod error;
mod iter;
mod keys;
mod multikey;

#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(test)]
mod tests;

pub use error::Error;
pub use iter::{Iter, LevelOrder};
pub use keys::Keys;
pub use multikey::MultiKeyTree;

/// A node type that can be linked into an [`RbTree`].
pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive red-black tree.
///
/// The tree stores one node per distinct key. Child links are the ownership
/// edges; the parent link is a non-owning back-reference used only for
/// navigation and rotation bookkeeping.
pub struct RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// Intrusive links and color bit embedded in every tree node.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    color: Color,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> RbTree<T> {
        RbTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no nodes.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of nodes in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert!(
                    T::links(root).as_ref().parent().is_none(),
                    "root must not have a parent"
                );
                assert_eq!(
                    T::links(root).as_ref().color(),
                    Color::Black,
                    "root must be black"
                );
                self.assert_invariants_at(root, None, None);
            }
        }
    }

    // Checks ordering, link consistency and the red-black invariants for the
    // subtree at `node`, and returns its black-height. `lo` and `hi` are the
    // exclusive key bounds inherited from ancestors.
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lo: Option<&T::Key>,
        hi: Option<&T::Key>,
    ) -> usize {
        unsafe {
            let key = node.as_ref().key();
            let color = T::links(node).as_ref().color();

            if let Some(lo) = lo {
                assert!(lo < key, "key {key:?} violates lower bound {lo:?}");
            }
            if let Some(hi) = hi {
                assert!(key < hi, "key {key:?} violates upper bound {hi:?}");
            }

            let mut child_heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure the red property holds.
                    if color == Color::Red {
                        assert_eq!(
                            T::links(child).as_ref().color(),
                            Color::Black,
                            "red node {key:?} has a red child"
                        );
                    }

                    // Ensure the child's parent link points back to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let (lo, hi) = match dir {
                        Dir::Left => (lo, Some(key)),
                        Dir::Right => (Some(key), hi),
                    };

                    child_heights[dir as usize] = self.assert_invariants_at(child, lo, hi);
                }
            }

            // Ensure both sides contribute the same black-height.
            assert_eq!(
                child_heights[0], child_heights[1],
                "black-height mismatch below {key:?}"
            );

            child_heights[0] + usize::from(color == Color::Black)
        }
    }

    /// Returns `true` if the tree contains a node whose key equals `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a mutable reference to the node corresponding to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => self.replace_child(parent, old_child, new_child),
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            if T::links(parent).as_ref().child(Dir::Left) == Some(old_child) {
                T::links(parent).as_mut().set_child(Dir::Left, new_child);
            } else {
                debug_assert_eq!(
                    T::links(parent).as_ref().child(Dir::Right),
                    Some(old_child),
                    "`old_child` must be a child of `parent`"
                );

                T::links(parent).as_mut().set_child(Dir::Right, new_child);
            }
        }
    }

    /// Rotates `child` up into `parent`'s position, with `parent` becoming a
    /// child of `child`.
    ///
    /// When `child` is `parent`'s right child this is a left rotation, and a
    /// right rotation when it is the left child. The in-order key sequence is
    /// preserved; colors are untouched. If `parent` was the root, `child`
    /// becomes the new root.
    ///
    /// Returns [`Error::UnrelatedNodes`] if `child`'s parent link is not
    /// exactly `parent`.
    ///
    /// # Safety
    ///
    /// The caller must ensure both nodes are elements of `self`, and not of
    /// any other tree.
    pub unsafe fn rotate(&mut self, child: NonNull<T>, parent: NonNull<T>) -> Result<(), Error> {
        if unsafe { T::links(child).as_ref().parent() } != Some(parent) {
            return Err(Error::UnrelatedNodes);
        }

        unsafe { self.rotate_unchecked(child, parent) };
        Ok(())
    }

    // Performs a rotation, moving `child` up and `parent` down.
    //
    // The colors of affected nodes are not updated.
    unsafe fn rotate_unchecked(&mut self, child: NonNull<T>, parent: NonNull<T>) {
        unsafe {
            // - `parent` becomes the `dir` child of `child`.
            // - `across` goes from the `dir` child of `child` to the `!dir`
            //   child of `parent`.
            let dir = if T::links(parent).as_ref().right() == Some(child) {
                Dir::Left
            } else {
                Dir::Right
            };

            assert!(self.root.map(|r| r != child).unwrap_or(false));

            let across = T::links(child).as_ref().child(dir);
            T::links(parent).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(parent));

            T::links(child).as_mut().set_child(dir, Some(parent));
            let grandparent = T::links(parent).as_mut().set_parent(Some(child));
            T::links(child).as_mut().set_parent(grandparent);

            match grandparent {
                Some(grandparent) => self.replace_child(grandparent, parent, Some(child)),
                None => self.root = Some(child),
            }
        }
    }

    /// Inserts an item into the tree.
    ///
    /// The new node is attached as a red leaf at the position its key leads
    /// to, and the tree is rebalanced. If a node with an equal key is already
    /// present, the tree is left untouched and the rejected handle is handed
    /// back.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        let root = match self.root {
            Some(root) => root,
            None => {
                // Tree is empty. Set `item` as the root and return.
                unsafe {
                    let links = T::links(ptr).as_mut();
                    links.set_parent(None);
                    links.set_left(None);
                    links.set_right(None);
                    links.set_color(Color::Black);
                }

                self.root = Some(ptr);
                self.len += 1;
                return None;
            }
        };

        let mut cur = root;

        // Descend the tree, looking for a free leaf slot.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(cur.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                // An equal key is already present. `ptr` was never linked, so
                // the handle can be reconstituted and handed back.
                Ordering::Equal => return Some(unsafe { T::from_ptr(ptr) }),
            };

            unsafe {
                match T::links(cur).as_ref().child(dir) {
                    // Descend.
                    Some(child) => cur = child,

                    // Attach `item` as a red leaf.
                    None => {
                        let links = T::links(ptr).as_mut();
                        links.set_parent(Some(cur));
                        links.set_left(None);
                        links.set_right(None);
                        links.set_color(Color::Red);

                        T::links(cur).as_mut().set_child(dir, Some(ptr));
                        break;
                    }
                }
            }
        }

        self.rebalance_inserted(ptr);
        self.len += 1;
        None
    }

    // Restores the red-black invariants after `node` was attached as a red
    // leaf.
    //
    // The loop re-runs the case analysis from the node under repair upward
    // until the red property holds or the root is reached:
    //
    // - parent black or absent: done.
    // - red uncle: recolor parent and uncle black, grandparent red, and
    //   restart at the grandparent.
    // - black or absent uncle, node and parent on the same side: recolor
    //   parent black and grandparent red, then rotate the parent up through
    //   the grandparent. Done.
    // - black or absent uncle, opposite sides: rotate the node up through
    //   its parent, turning the shape into the same-side case with the old
    //   parent as the node under repair.
    //
    // The root is forced black at the end of every insertion.
    fn rebalance_inserted(&mut self, node: NonNull<T>) {
        let mut n = node;

        unsafe {
            while let Some(parent) = T::links(n).as_ref().parent() {
                if T::links(parent).as_ref().color() == Color::Black {
                    break;
                }

                // The root is always black, so a red parent has a parent.
                let grandparent = T::links(parent)
                    .as_ref()
                    .parent()
                    .expect("a red node cannot be the root");

                let parent_dir = self.which_child(grandparent, parent);
                let uncle = T::links(grandparent).as_ref().child(!parent_dir);

                match uncle {
                    Some(uncle) if T::links(uncle).as_ref().color() == Color::Red => {
                        T::links(parent).as_mut().set_color(Color::Black);
                        T::links(uncle).as_mut().set_color(Color::Black);
                        T::links(grandparent).as_mut().set_color(Color::Red);

                        // The grandparent just turned red, so the violation
                        // may have moved up. Restart there.
                        n = grandparent;
                    }

                    _ if self.which_child(parent, n) == parent_dir => {
                        // Straight line of three. Recoloring happens before
                        // the rotation because the rotation reassigns the
                        // parent/child relationships.
                        T::links(parent).as_mut().set_color(Color::Black);
                        T::links(grandparent).as_mut().set_color(Color::Red);
                        self.rotate_unchecked(parent, grandparent);
                    }

                    _ => {
                        // Zig-zag. Rotating `n` over its parent leaves the
                        // old parent below with the conflict intact, so it
                        // becomes the node under repair.
                        self.rotate_unchecked(n, parent);
                        n = parent;
                    }
                }
            }

            if let Some(root) = self.root {
                T::links(root).as_mut().set_color(Color::Black);
            }
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    /// Clears the tree, removing and dropping all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    /// Returns an iterator visiting all nodes in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns an iterator visiting all nodes in breadth-first level order.
    ///
    /// Mainly useful for verifying tree shape after rotations.
    pub fn levelorder(&self) -> LevelOrder<'_, T> {
        LevelOrder::new(self)
    }

    // Support methods ========================================================

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if T::links(parent).as_ref().left() == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Drop for RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                color: Color::Red,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn color(&self) -> Color {
        unsafe { (*self.inner.get()).color }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_color(&mut self, color: Color) {
        self.inner.get_mut().color = color;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}
