//! Disk-backed interval search trees.
//!
//! A [`Tree`] partitions a single chromosome's coordinate range into nested
//! bins. Every bin may be split into `arity` equal-width children, down to a
//! minimum bin width. Each inserted interval is assigned to the smallest bin
//! that fully contains it, and bins are only created once an interval lands
//! in them, so empty stretches of the genome never allocate any nodes.
//!
//! Nodes are stored in a single list (the _arena_) in creation order. The
//! position of a node within that list is its identity: child and parent
//! links are expressed as indices into the list, and `nodes[0]` is always the
//! root. This list (see [`Entry`] and the [`table`] module) is also the only
//! state that needs to be persisted to rehydrate a tree later.

use tracing::trace;

use crate::Range;

pub mod builder;
pub mod node;
pub mod table;

pub use builder::Builder;
pub use node::Node;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a [`Tree`].
#[derive(Debug)]
pub enum Error {
    /// The arity is too small to subdivide a bin.
    InvalidArity(usize),

    /// The root range covers no positions.
    EmptyRange(Range),

    /// No node exists at the provided index.
    NodeNotFound(usize),

    /// The start byte of a node was stamped more than once.
    StartByteAlreadySet(usize, u64),

    /// A node list with no nodes was provided.
    EmptyNodeList,

    /// A node was found at a position that doesn't match its index.
    IndexMismatch {
        /// The position of the node within the node list.
        expected: usize,

        /// The index recorded for the node.
        found: usize,
    },

    /// A node did not fit exactly into a vacant child slot of any node that
    /// precedes it.
    OrphanNode(usize, Range),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArity(arity) => {
                write!(f, "invalid arity: expected at least 2, found {arity}")
            }
            Error::EmptyRange(range) => write!(f, "the root range is empty: {range}"),
            Error::NodeNotFound(index) => write!(f, "node not found: {index}"),
            Error::StartByteAlreadySet(index, start_byte) => write!(
                f,
                "the start byte of node {index} was already set to {start_byte}"
            ),
            Error::EmptyNodeList => write!(f, "the node list is empty"),
            Error::IndexMismatch { expected, found } => write!(
                f,
                "node index mismatch: expected index {expected}, found index {found}"
            ),
            Error::OrphanNode(index, range) => write!(
                f,
                "node {index} ({range}) does not fit into any bin that precedes it"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Entries
////////////////////////////////////////////////////////////////////////////////////////

/// The persisted portion of a [`Node`].
///
/// Child and parent links are not part of an entry: they are recomputed from
/// the ranges when a tree is rehydrated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry {
    /// The position of the node within the node list.
    pub index: usize,

    /// The range covered by the bin.
    pub range: Range,

    /// The number of records stored directly in the bin.
    pub size: u64,

    /// The number of records stored in the bin and all of its descendants.
    pub subtree_size: u64,

    /// The offset in the backing file where the bin's records begin.
    pub start_byte: Option<u64>,
}

impl From<&Node> for Entry {
    fn from(node: &Node) -> Self {
        Self {
            index: node.index(),
            range: node.range(),
            size: node.size(),
            subtree_size: node.subtree_size(),
            start_byte: node.start_byte(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Tree
////////////////////////////////////////////////////////////////////////////////////////

/// An interval search tree over a single chromosome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tree {
    /// The number of equal-width children a bin may be split into.
    arity: usize,

    /// The width at or below which a bin is never split.
    min_bin_size: u64,

    /// The nodes in creation order.
    nodes: Vec<Node>,
}

impl Tree {
    /// Creates a new tree containing only a root node that covers `range`.
    ///
    /// Generally, you will want to use a [`Builder`] to construct one of
    /// these.
    pub fn try_new(arity: usize, min_bin_size: u64, range: Range) -> Result<Self> {
        if arity < 2 {
            return Err(Error::InvalidArity(arity));
        }

        if range.is_empty() {
            return Err(Error::EmptyRange(range));
        }

        Ok(Self {
            arity,
            min_bin_size,
            nodes: vec![Node::new(0, range, arity, None)],
        })
    }

    /// Rehydrates a tree from a list of persisted entries.
    ///
    /// The first entry must be the root, and every entry must have an index
    /// equal to its position within the list. Child slots and parent links
    /// are reconstructed from the node ranges, so the tree must be rehydrated
    /// with the same `arity` and `min_bin_size` that it was built with.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    /// use regionindex::Tree;
    /// use regionindex::tree::Builder;
    /// use regionindex::tree::Entry;
    ///
    /// let mut tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
    /// tree.insert(Range::new(50, 120));
    ///
    /// let entries = tree.entries().collect::<Vec<Entry>>();
    /// let rehydrated = Tree::try_from_entries(tree.arity(), tree.min_bin_size(), entries)?;
    /// assert_eq!(rehydrated, tree);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_from_entries(
        arity: usize,
        min_bin_size: u64,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self> {
        let mut entries = entries.into_iter();
        let root = entries.next().ok_or(Error::EmptyNodeList)?;

        if root.index != 0 {
            return Err(Error::IndexMismatch {
                expected: 0,
                found: root.index,
            });
        }

        let mut tree = Self::try_new(arity, min_bin_size, root.range)?;
        tree.nodes[0].set_counts(root.size, root.subtree_size);
        tree.nodes[0].set_start_byte(root.start_byte);

        for (expected, entry) in entries.enumerate().map(|(i, entry)| (i + 1, entry)) {
            if entry.index != expected {
                return Err(Error::IndexMismatch {
                    expected,
                    found: entry.index,
                });
            }

            let (parent, slot) = tree
                .locate_vacant_slot(&entry.range)
                .ok_or(Error::OrphanNode(entry.index, entry.range))?;

            let mut node = Node::new(expected, entry.range, arity, Some(parent));
            node.set_counts(entry.size, entry.subtree_size);
            node.set_start_byte(entry.start_byte);

            tree.nodes.push(node);
            tree.nodes[parent].set_child(slot, expected);
        }

        Ok(tree)
    }

    /// Gets the number of equal-width children a bin may be split into.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Gets the width at or below which a bin is never split.
    pub fn min_bin_size(&self) -> u64 {
        self.min_bin_size
    }

    /// Gets the root node.
    pub fn root(&self) -> &Node {
        // SAFETY: a tree is always constructed with a root node and nodes are
        // never removed, so this will always unwrap.
        self.nodes.first().unwrap()
    }

    /// Gets all nodes in index order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Gets the node at `index`.
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Returns an iterator over the children of `node` that exist, in slot
    /// order.
    pub fn children<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.children().filter_map(|index| self.nodes.get(index))
    }

    /// Gets the total number of records inserted into the tree.
    pub fn len(&self) -> u64 {
        self.root().subtree_size()
    }

    /// Returns whether no records have been inserted into the tree.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the persisted form of every node, in index
    /// order.
    pub fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
        self.nodes.iter().map(Entry::from)
    }

    /// Returns an iterator over the nodes without children.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// Gets the number of levels in the tree (a lone root has a depth of one).
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    /// use regionindex::tree::Builder;
    ///
    /// let mut tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
    /// assert_eq!(tree.depth(), 1);
    ///
    /// tree.insert(Range::new(50, 120));
    /// assert_eq!(tree.depth(), 4);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn depth(&self) -> usize {
        // Parents always precede their children in the node list.
        let mut depths = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let depth = match node.parent() {
                Some(parent) => depths[parent] + 1,
                None => 1,
            };

            depths.push(depth);
        }

        depths.into_iter().max().unwrap_or(1)
    }

    /// Inserts an interval into the tree and returns the index of the bin it
    /// was assigned to.
    ///
    /// The interval descends from the root into whichever child slot fully
    /// contains it, creating the child on first use, until it reaches a bin
    /// that is at most the minimum bin size wide or none of the bin's child
    /// slots can hold it. Intervals that are not contained in the root range
    /// are assigned to the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    /// use regionindex::tree::Builder;
    ///
    /// let mut tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
    ///
    /// let index = tree.insert(Range::new(50, 120));
    /// let bin = tree.node(index).unwrap();
    ///
    /// assert_eq!(bin.range(), Range::new(1, 8_000));
    /// assert_eq!(bin.size(), 1);
    /// assert_eq!(tree.root().subtree_size(), 1);
    ///
    /// // Spans the boundary between the first two root slots.
    /// let index = tree.insert(Range::new(199_990, 200_010));
    /// assert_eq!(index, 0);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn insert(&mut self, range: Range) -> usize {
        let mut current = 0;

        loop {
            self.nodes[current].increment_subtree_size();

            let next = match self.slot_for(self.nodes[current].range(), &range) {
                Some((slot, bounds)) => match self.nodes[current].child(slot) {
                    Some(child) => child,
                    None => self.create_child(current, slot, bounds),
                },
                None => {
                    self.nodes[current].increment_size();
                    return current;
                }
            };

            current = next;
        }
    }

    /// Stamps the offset in the backing file where the records of the node at
    /// `index` begin.
    ///
    /// A start byte can only be stamped once.
    pub fn set_start_byte(&mut self, index: usize, start_byte: u64) -> Result<()> {
        let node = self
            .nodes
            .get_mut(index)
            .ok_or(Error::NodeNotFound(index))?;

        if let Some(existing) = node.start_byte() {
            return Err(Error::StartByteAlreadySet(index, existing));
        }

        node.set_start_byte(Some(start_byte));
        Ok(())
    }

    /// Creates a new child of `parent` in `slot` and returns its index.
    fn create_child(&mut self, parent: usize, slot: usize, range: Range) -> usize {
        let index = self.nodes.len();
        trace!(index, parent, slot, %range, "creating bin");

        self.nodes
            .push(Node::new(index, range, self.arity, Some(parent)));
        self.nodes[parent].set_child(slot, index);

        index
    }

    /// Finds the child slot of a bin covering `parent` that fully contains
    /// `range`, returning the slot and the range the slot covers.
    fn slot_for(&self, parent: Range, range: &Range) -> Option<(usize, Range)> {
        if parent.len() <= self.min_bin_size || !parent.contains(range) {
            return None;
        }

        let width = parent.len() / self.arity as u64;

        if width == 0 {
            return None;
        }

        let slot = ((range.from() - parent.from()) / width).min(self.arity as u64 - 1) as usize;
        let from = parent.from() + slot as u64 * width;
        let to = match slot == self.arity - 1 {
            true => parent.to(),
            false => from + width - 1,
        };

        let bounds = Range::new(from, to);
        bounds.contains(range).then_some((slot, bounds))
    }

    /// Finds the vacant child slot whose range is exactly `range`, returning
    /// the parent index and the slot.
    fn locate_vacant_slot(&self, range: &Range) -> Option<(usize, usize)> {
        let mut current = 0;

        loop {
            let (slot, bounds) = self.slot_for(self.nodes[current].range(), range)?;

            match self.nodes[current].child(slot) {
                Some(child) => current = child,
                None => return (bounds == *range).then_some((current, slot)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Builds the tree used throughout the examples.
    fn genome() -> Tree {
        Builder::default()
            .try_build(Range::new(1, 1_000_000))
            .unwrap()
    }

    /// Checks that every node's subtree size is its own size plus the subtree
    /// sizes of its children.
    fn subtree_sizes_are_consistent(tree: &Tree) -> bool {
        tree.nodes().iter().all(|node| {
            let children = tree
                .children(node)
                .map(|child| child.subtree_size())
                .sum::<u64>();

            node.subtree_size() == node.size() + children
        })
    }

    #[test]
    fn bins_are_created_lazily_in_index_order() {
        let mut tree = genome();
        let bin = tree.insert(Range::new(50, 120));

        let ranges = tree.nodes().iter().map(|n| n.range()).collect::<Vec<_>>();
        assert_eq!(
            ranges,
            vec![
                Range::new(1, 1_000_000),
                Range::new(1, 200_000),
                Range::new(1, 40_000),
                Range::new(1, 8_000),
            ]
        );

        assert_eq!(bin, 3);
        assert_eq!(tree.node(3).unwrap().parent(), Some(2));
        assert_eq!(tree.root().child(0), Some(1));
        assert!(tree.nodes().iter().all(|node| node.subtree_size() == 1));
        assert_eq!(tree.leaves().map(|n| n.index()).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn existing_bins_are_reused() {
        let mut tree = genome();
        let first = tree.insert(Range::new(50, 120));
        let second = tree.insert(Range::new(500, 700));

        assert_eq!(first, second);
        assert_eq!(tree.nodes().len(), 4);
        assert_eq!(tree.node(first).unwrap().size(), 2);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn the_last_slot_absorbs_the_remainder() {
        let mut tree = Builder::default()
            .with_min_bin_size(1)
            .try_build(Range::new(0, 11))
            .unwrap();

        // Width is 12 / 5 = 2, so the last slot covers 8-11.
        let bin = tree.insert(Range::new(9, 11));
        assert_eq!(tree.node(bin).unwrap().range(), Range::new(8, 11));
    }

    #[test]
    fn intervals_outside_the_root_stay_at_the_root() {
        let mut tree = genome();

        assert_eq!(tree.insert(Range::new(999_999, 1_000_001)), 0);
        assert_eq!(tree.insert(Range::new(10, 5)), 0);
        assert_eq!(tree.root().size(), 2);
        assert_eq!(tree.nodes().len(), 1);
    }

    #[test]
    fn start_bytes_can_only_be_stamped_once() {
        let mut tree = genome();
        let bin = tree.insert(Range::new(50, 120));

        tree.set_start_byte(bin, 16).unwrap();
        assert_eq!(tree.node(bin).unwrap().start_byte(), Some(16));

        let err = tree.set_start_byte(bin, 32).unwrap_err();
        assert!(matches!(err, Error::StartByteAlreadySet(3, 16)));

        let err = tree.set_start_byte(100, 32).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(100)));
    }

    #[test]
    fn rehydration_rejects_bad_node_lists() {
        let err = Tree::try_from_entries(5, 10_000, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyNodeList));

        let mut tree = genome();
        tree.insert(Range::new(50, 120));

        let mut entries = tree.entries().collect::<Vec<_>>();
        entries[2].index = 7;
        let err = Tree::try_from_entries(5, 10_000, entries).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexMismatch {
                expected: 2,
                found: 7
            }
        ));

        let mut entries = tree.entries().collect::<Vec<_>>();
        entries[3].range = Range::new(1, 8_001);
        let err = Tree::try_from_entries(5, 10_000, entries).unwrap_err();
        assert!(matches!(err, Error::OrphanNode(3, _)));

        // Different parameters produce a different slot geometry.
        let entries = tree.entries().collect::<Vec<_>>();
        let err = Tree::try_from_entries(4, 10_000, entries).unwrap_err();
        assert!(matches!(err, Error::OrphanNode(1, _)));
    }

    proptest! {
        #[test]
        fn subtree_sizes_hold_after_any_insertions(
            intervals in prop::collection::vec((1u64..1_000_000, 0u64..50_000), 0..300)
        ) {
            let mut tree = genome();

            for (start, length) in intervals {
                tree.insert(Range::new(start, start + length));
            }

            prop_assert!(subtree_sizes_are_consistent(&tree));

            let nested = tree.nodes().iter().all(|node| {
                tree.children(node).all(|child| node.range().contains(&child.range()))
            });
            prop_assert!(nested);

            let splittable = tree
                .nodes()
                .iter()
                .all(|node| node.range().len() > tree.min_bin_size() || node.is_leaf());
            prop_assert!(splittable);
        }

        #[test]
        fn rehydration_reproduces_the_tree(
            intervals in prop::collection::vec((1u64..1_000_000, 0u64..5_000), 0..200)
        ) {
            let mut tree = genome();

            for (start, length) in intervals {
                tree.insert(Range::new(start, start + length));
            }

            let entries = tree.entries().collect::<Vec<_>>();
            let rehydrated = Tree::try_from_entries(tree.arity(), tree.min_bin_size(), entries);
            prop_assert_eq!(rehydrated.unwrap(), tree);
        }
    }
}
