//! Materialized Merkle tree kept by callers off-ledger.
//!
//! The ledger stores only roots. To build witnesses a caller keeps the full
//! tree, fed by the leaf updates of committed transitions.

use std::collections::HashMap;

use bindreg_core::merkle::{empty_subtree_root, hash_leaf, hash_node};
use bindreg_core::{Blake3Hash, Commitment, LeafValue, PathEntry, Witness, TREE_DEPTH, TREE_LEAVES};

use crate::error::TreeError;

/// A full tree of depth [`TREE_DEPTH`].
#[derive(Debug, Clone)]
pub struct LocalTree {
    /// `levels[0]` holds leaf hashes, `levels[TREE_DEPTH]` the root.
    levels: Vec<Vec<Blake3Hash>>,
    leaves: Vec<LeafValue>,
    positions: HashMap<LeafValue, u32>,
}

impl LocalTree {
    /// Create an all-empty tree.
    pub fn new() -> Self {
        let levels = (0..=TREE_DEPTH)
            .map(|height| vec![empty_subtree_root(height); (TREE_LEAVES >> height) as usize])
            .collect();
        Self {
            levels,
            leaves: vec![LeafValue::ZERO; TREE_LEAVES as usize],
            positions: HashMap::new(),
        }
    }

    /// The current root.
    pub fn root(&self) -> Commitment {
        self.levels[TREE_DEPTH][0]
    }

    /// Number of occupied leaves.
    pub fn len(&self) -> usize {
        self.leaves.iter().filter(|leaf| !leaf.is_zero()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The value at `index`, if occupied.
    pub fn leaf(&self, index: u32) -> Option<LeafValue> {
        self.leaves
            .get(index as usize)
            .copied()
            .filter(|leaf| !leaf.is_zero())
    }

    /// The first index holding `value`.
    pub fn position(&self, value: &LeafValue) -> Option<u32> {
        self.positions.get(value).copied()
    }

    /// Write `value` into the empty leaf at `index` and return the new root.
    pub fn insert(&mut self, index: u32, value: LeafValue) -> Result<Commitment, TreeError> {
        if index >= TREE_LEAVES {
            return Err(TreeError::IndexOutOfRange { index });
        }
        if value.is_zero() {
            return Err(TreeError::EmptyValue);
        }
        let slot = index as usize;
        if !self.leaves[slot].is_zero() {
            return Err(TreeError::SlotOccupied { index });
        }

        self.leaves[slot] = value;
        self.positions.entry(value).or_insert(index);

        let mut pos = slot;
        let mut node = hash_leaf(&value);
        self.levels[0][pos] = node;
        for height in 0..TREE_DEPTH {
            let sibling = self.levels[height][pos ^ 1];
            node = if pos & 1 == 0 {
                hash_node(&node, &sibling)
            } else {
                hash_node(&sibling, &node)
            };
            pos >>= 1;
            self.levels[height + 1][pos] = node;
        }

        Ok(node)
    }

    /// The witness for `index` against the current root.
    pub fn witness(&self, index: u32) -> Result<Witness, TreeError> {
        if index >= TREE_LEAVES {
            return Err(TreeError::IndexOutOfRange { index });
        }

        let mut path = [PathEntry {
            sibling: Blake3Hash::ZERO,
            goes_left: true,
        }; TREE_DEPTH];
        let mut pos = index as usize;
        for (height, entry) in path.iter_mut().enumerate() {
            *entry = PathEntry {
                sibling: self.levels[height][pos ^ 1],
                goes_left: pos & 1 == 0,
            };
            pos >>= 1;
        }
        Ok(Witness::new(path))
    }
}

impl Default for LocalTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindreg_core::{append_at, empty_root, prove_inclusion};
    use proptest::prelude::*;

    fn leaf(byte: u8) -> LeafValue {
        LeafValue::from_bytes([byte; 32])
    }

    #[test]
    fn test_empty_tree_matches_empty_root() {
        let tree = LocalTree::new();
        assert_eq!(tree.root(), empty_root());
        assert!(tree.is_empty());
        assert_eq!(tree.witness(17).unwrap(), Witness::for_empty_tree(17));
    }

    #[test]
    fn test_insert_matches_append_log() {
        let mut tree = LocalTree::new();
        let mut root = tree.root();

        for (index, byte) in [(0u32, 1u8), (1, 2), (2, 3), (200, 4)] {
            let witness = tree.witness(index).unwrap();
            root = append_at(&root, &witness, &leaf(byte)).unwrap();
            assert_eq!(tree.insert(index, leaf(byte)).unwrap(), root);
        }

        assert_eq!(tree.len(), 4);
        assert!(prove_inclusion(&root, &tree.witness(1).unwrap(), &leaf(2)));
        assert!(prove_inclusion(&root, &tree.witness(5).unwrap(), &LeafValue::ZERO));
    }

    #[test]
    fn test_insert_is_first_write_only() {
        let mut tree = LocalTree::new();
        tree.insert(3, leaf(1)).unwrap();
        let root = tree.root();

        assert_eq!(tree.insert(3, leaf(2)), Err(TreeError::SlotOccupied { index: 3 }));
        assert_eq!(tree.root(), root);
        assert_eq!(tree.leaf(3), Some(leaf(1)));
    }

    #[test]
    fn test_insert_rejects_bad_input() {
        let mut tree = LocalTree::new();
        assert_eq!(
            tree.insert(TREE_LEAVES, leaf(1)),
            Err(TreeError::IndexOutOfRange { index: TREE_LEAVES })
        );
        assert_eq!(tree.insert(0, LeafValue::ZERO), Err(TreeError::EmptyValue));
        assert!(tree.witness(TREE_LEAVES).is_err());
    }

    #[test]
    fn test_position_lookup() {
        let mut tree = LocalTree::new();
        tree.insert(9, leaf(7)).unwrap();
        assert_eq!(tree.position(&leaf(7)), Some(9));
        assert_eq!(tree.position(&leaf(8)), None);
        assert_eq!(tree.leaf(10), None);
    }

    proptest! {
        #[test]
        fn prop_witnesses_prove_all_leaves(indices in prop::collection::btree_set(0u32..TREE_LEAVES, 1..20)) {
            let mut tree = LocalTree::new();
            for &index in &indices {
                tree.insert(index, leaf((index % 250) as u8 + 1)).unwrap();
            }
            let root = tree.root();
            for &index in &indices {
                let witness = tree.witness(index).unwrap();
                prop_assert_eq!(witness.index(), index);
                prop_assert!(witness.proves(&root, &leaf((index % 250) as u8 + 1)));
            }
        }
    }
}
