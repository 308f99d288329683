//! Commitment tree over 32-byte digests.
//!
//! Nodes live in one array of length `2N` with the root at index 1: the
//! children of node `i` are `(2i, 2i+1)`, its sibling is `i ^ 1` and its
//! parent `i >> 1`. Leaves occupy `[N, 2N)`. Index 0 is unused.

use sha2::{Digest, Sha256};

/// Digest width, twice the security parameter.
pub const HASH_LEN: usize = 32;

pub type TreeNode = [u8; HASH_LEN];

pub fn hash_leaf_payload(parts: &[&[u8]]) -> TreeNode {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn hash_pair(left: &TreeNode, right: &TreeNode) -> TreeNode {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// A fully materialized commitment tree.
pub struct CommitmentTree {
    nodes: Vec<TreeNode>,
}

impl CommitmentTree {
    /// Build from a power-of-two list of leaf digests. Internal levels are
    /// filled top index down, `for level = N; level >= 2; level >>= 1`.
    pub fn from_leaves(leaves: Vec<TreeNode>) -> Self {
        let n = leaves.len();
        assert!(n.is_power_of_two(), "leaf count must be a power of two");
        let mut nodes = vec![[0u8; HASH_LEN]; 2 * n];
        nodes[n..].copy_from_slice(&leaves);

        let mut level = n;
        while level >= 2 {
            for j in level / 2..level {
                nodes[j] = hash_pair(&nodes[2 * j], &nodes[2 * j + 1]);
            }
            level >>= 1;
        }
        CommitmentTree { nodes }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.len() / 2
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[1]
    }

    pub fn leaf(&self, index: usize) -> &TreeNode {
        &self.nodes[self.leaf_count() + index]
    }

    /// Sibling digests along the path from leaf `index` to the root,
    /// bottom up.
    pub fn auth_path(&self, index: usize) -> Vec<TreeNode> {
        let mut path = Vec::with_capacity(self.leaf_count().trailing_zeros() as usize);
        let mut pos = self.leaf_count() + index;
        while pos > 1 {
            path.push(self.nodes[pos ^ 1]);
            pos >>= 1;
        }
        path
    }
}

/// Climb from a leaf digest to a root candidate. At each step the bit of
/// the leaf index decides whether the sibling sits on the left or right.
pub fn fold_auth_path(leaf: &TreeNode, index: usize, path: &[TreeNode]) -> TreeNode {
    let mut acc = *leaf;
    let mut idx = index;
    for sibling in path {
        acc = if idx & 1 == 1 {
            hash_pair(sibling, &acc)
        } else {
            hash_pair(&acc, sibling)
        };
        idx >>= 1;
    }
    acc
}
