/// SHA-256 Merkle tree stored as an arena of levels.
///
///   levels[0]    = leaf digests, in batch order
///   levels[last] = [root]
///
/// If a level has an odd number of nodes, the last node is paired with a
/// copy of itself. Proof derivation in `proof.rs` follows the same rule;
/// promoting the lone node instead would give different roots.
use crate::crypto::hash::{hash_pair, Digest};
use crate::error::{AnchorError, Result};

/// A built, read-only Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    pub(crate) levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build the tree from leaf digests in batch order.
    ///
    /// A single leaf is its own root; no hashing step is applied.
    pub fn from_leaf_hashes(leaves: Vec<Digest>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(AnchorError::Input(
                "cannot build a Merkle tree from an empty batch".into(),
            ));
        }

        let mut levels = vec![leaves];

        loop {
            let current = &levels[levels.len() - 1];
            if current.len() == 1 {
                break;
            }

            let next: Vec<Digest> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    hash_pair(left, right)
                })
                .collect();

            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The Merkle root.
    pub fn root(&self) -> Digest {
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Leaf digests in batch order.
    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    /// All levels (for debugging/testing).
    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }
}
