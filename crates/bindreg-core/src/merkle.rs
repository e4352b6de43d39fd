//! Fixed-depth Merkle witnesses.
//!
//! The tree is never materialized here. A [`Witness`] carries one sibling per
//! level plus the direction taken at that level, which is enough to derive
//! the leaf index and to recompute the root for any value placed at that
//! leaf.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::crypto::{domain, Blake3Hash};
use crate::types::{Commitment, LeafValue};

/// Depth of every registry tree.
pub const TREE_DEPTH: usize = 8;

/// Number of leaves in a tree of [`TREE_DEPTH`].
pub const TREE_LEAVES: u32 = 1 << TREE_DEPTH;

/// Hash a leaf value into its level-0 node.
pub fn hash_leaf(value: &LeafValue) -> Blake3Hash {
    Blake3Hash::hash_with_domain(domain::LEAF, &[value.as_bytes()])
}

/// Hash two children into their parent.
pub fn hash_node(left: &Blake3Hash, right: &Blake3Hash) -> Blake3Hash {
    Blake3Hash::hash_with_domain(domain::NODE, &[left.as_bytes(), right.as_bytes()])
}

/// Roots of all-empty subtrees, indexed by height (0 = a single empty leaf).
fn empty_roots() -> &'static [Blake3Hash; TREE_DEPTH + 1] {
    static EMPTY: OnceLock<[Blake3Hash; TREE_DEPTH + 1]> = OnceLock::new();
    EMPTY.get_or_init(|| {
        let mut roots = [Blake3Hash::ZERO; TREE_DEPTH + 1];
        roots[0] = hash_leaf(&LeafValue::ZERO);
        for height in 1..=TREE_DEPTH {
            roots[height] = hash_node(&roots[height - 1], &roots[height - 1]);
        }
        roots
    })
}

/// Root of an all-empty subtree of the given height.
///
/// # Panics
/// Panics if `height > TREE_DEPTH`.
pub fn empty_subtree_root(height: usize) -> Blake3Hash {
    empty_roots()[height]
}

/// Root of the all-empty tree.
pub fn empty_root() -> Commitment {
    empty_roots()[TREE_DEPTH]
}

/// One level of a witness path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathEntry {
    /// The sibling node at this level.
    pub sibling: Blake3Hash,
    /// Whether the path node is the left child at this level.
    pub goes_left: bool,
}

/// A leaf-to-root sibling path.
///
/// `path[0]` is the leaf level. A witness is bound to exactly one index and
/// says nothing about the value currently stored there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Witness {
    pub path: [PathEntry; TREE_DEPTH],
}

impl Witness {
    /// Create a witness from its path.
    pub const fn new(path: [PathEntry; TREE_DEPTH]) -> Self {
        Self { path }
    }

    /// The witness for `index` in a completely empty tree.
    ///
    /// # Panics
    /// Panics if `index >= TREE_LEAVES`.
    pub fn for_empty_tree(index: u32) -> Self {
        assert!(index < TREE_LEAVES, "leaf index {} out of range", index);
        let mut path = [PathEntry {
            sibling: Blake3Hash::ZERO,
            goes_left: true,
        }; TREE_DEPTH];
        for (level, entry) in path.iter_mut().enumerate() {
            entry.sibling = empty_subtree_root(level);
            entry.goes_left = (index >> level) & 1 == 0;
        }
        Self { path }
    }

    /// The leaf index this witness is bound to.
    pub fn index(&self) -> u32 {
        self.path
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.goes_left)
            .fold(0u32, |acc, (level, _)| acc | (1 << level))
    }

    /// The root obtained when `value` sits at this witness's leaf and every
    /// other leaf is unchanged.
    pub fn root_assuming(&self, value: &LeafValue) -> Commitment {
        self.path.iter().fold(hash_leaf(value), |current, entry| {
            if entry.goes_left {
                hash_node(&current, &entry.sibling)
            } else {
                hash_node(&entry.sibling, &current)
            }
        })
    }

    /// Whether `value` at this leaf reproduces `root`.
    pub fn proves(&self, root: &Commitment, value: &LeafValue) -> bool {
        self.root_assuming(value) == *root
    }
}
