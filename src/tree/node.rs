//! Bins within an interval search tree.

use crate::Range;

/// A bin within a [`Tree`](crate::Tree).
///
/// Nodes live in the tree's node list and refer to each other by their
/// position in that list. The children of a node are kept in a fixed set of
/// slots (one per equal-width subdivision of the node's range), any of which
/// may be vacant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    /// The position of this node within the tree's node list.
    index: usize,

    /// The range of positions covered by this bin.
    range: Range,

    /// The number of records stored directly in this bin.
    size: u64,

    /// The number of records stored in this bin and all of its descendants.
    subtree_size: u64,

    /// The offset in the backing file where this bin's records begin.
    start_byte: Option<u64>,

    /// The child slots.
    children: Box<[Option<usize>]>,

    /// The index of the parent node.
    parent: Option<usize>,
}

impl Node {
    /// Creates a new, empty node.
    pub(crate) fn new(index: usize, range: Range, arity: usize, parent: Option<usize>) -> Self {
        Self {
            index,
            range,
            size: 0,
            subtree_size: 0,
            start_byte: None,
            children: vec![None; arity].into_boxed_slice(),
            parent,
        }
    }

    /// Gets the position of this node within the tree's node list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Gets the range covered by this bin.
    pub fn range(&self) -> Range {
        self.range
    }

    /// Gets the number of records stored directly in this bin.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Gets the number of records stored in this bin and all of its
    /// descendants.
    pub fn subtree_size(&self) -> u64 {
        self.subtree_size
    }

    /// Gets the offset in the backing file where this bin's records begin.
    ///
    /// This is [`None`] until the bin's records have been written out.
    pub fn start_byte(&self) -> Option<u64> {
        self.start_byte
    }

    /// Gets the index of the parent node, if this is not the root.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Gets the node index held in a child slot.
    pub fn child(&self, slot: usize) -> Option<usize> {
        self.children.get(slot).copied().flatten()
    }

    /// Gets the child slots.
    pub fn slots(&self) -> &[Option<usize>] {
        &self.children
    }

    /// Returns an iterator over the indices of the children that exist.
    pub fn children(&self) -> impl Iterator<Item = usize> + '_ {
        self.children.iter().filter_map(|child| *child)
    }

    /// Returns whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Returns whether this node is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Records that one more record lives in this subtree.
    pub(crate) fn increment_subtree_size(&mut self) {
        self.subtree_size += 1;
    }

    /// Records that one more record lives directly in this bin.
    pub(crate) fn increment_size(&mut self) {
        self.size += 1;
    }

    /// Sets the record counts, as read back from a serialized node table.
    pub(crate) fn set_counts(&mut self, size: u64, subtree_size: u64) {
        self.size = size;
        self.subtree_size = subtree_size;
    }

    /// Sets the offset where this bin's records begin.
    pub(crate) fn set_start_byte(&mut self, start_byte: Option<u64>) {
        self.start_byte = start_byte;
    }

    /// Fills a child slot.
    pub(crate) fn set_child(&mut self, slot: usize, child: usize) {
        self.children[slot] = Some(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_nodes_are_empty_leaves() {
        let node = Node::new(0, Range::new(1, 1_000), 5, None);

        assert!(node.is_leaf());
        assert!(node.is_root());
        assert_eq!(node.slots().len(), 5);
        assert_eq!(node.size(), 0);
        assert_eq!(node.subtree_size(), 0);
        assert_eq!(node.start_byte(), None);
    }

    #[test]
    fn children_skip_vacant_slots() {
        let mut node = Node::new(0, Range::new(1, 1_000), 5, None);
        node.set_child(1, 4);
        node.set_child(3, 2);

        assert!(!node.is_leaf());
        assert_eq!(node.children().collect::<Vec<_>>(), vec![4, 2]);
        assert_eq!(node.child(0), None);
        assert_eq!(node.child(3), Some(2));
        assert_eq!(node.child(10), None);
    }
}
