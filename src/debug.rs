use core::fmt;

use crate::{Links, MultiKeyTree, RbTree, TreeNode};

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("color", &self.color())
            .finish()
    }
}

impl<T> fmt::Debug for RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|node| node.key()))
            .finish()
    }
}

impl<K> fmt::Debug for MultiKeyTree<K>
where
    K: Ord + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always the full key sequence, ignoring any stored start point.
        f.debug_list().entries(self.keys_from(None)).finish()
    }
}
