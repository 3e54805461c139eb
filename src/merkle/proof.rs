/// Merkle inclusion proof generation, verification and Blockcerts
/// `MerkleProof2017` serialization.
use serde::{Deserialize, Serialize};

use super::tree::MerkleTree;
use crate::anchor::AnchorMetadata;
use crate::crypto::hash::{hash_pair, Digest};
use crate::error::{AnchorError, Result};

/// Side of the current node on which a sibling sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Left,
    Right,
}

/// One step of the path from leaf to root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Digest,
    pub position: Position,
}

/// Proof that one leaf is committed under a root anchored in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf_index: usize,
    pub target: Digest,
    pub path: Vec<ProofStep>,
    pub root: Digest,
    pub anchor: AnchorMetadata,
}

impl MerkleTree {
    /// Sibling path for the leaf at `index`, or `None` if out of range.
    ///
    /// A node without a partner is paired with itself, matching construction.
    pub fn path(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.levels.len() - 1);
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);
            let position = if idx % 2 == 0 {
                Position::Right
            } else {
                Position::Left
            };
            path.push(ProofStep {
                sibling: *sibling,
                position,
            });
            idx /= 2;
        }

        Some(path)
    }
}

/// Derive one proof per leaf, in leaf order, for an anchored tree.
pub fn generate_proofs(tree: &MerkleTree, anchor: &AnchorMetadata) -> Vec<InclusionProof> {
    let root = tree.root();
    tree.leaves()
        .iter()
        .enumerate()
        .map(|(leaf_index, target)| InclusionProof {
            leaf_index,
            target: *target,
            // index comes from the tree's own leaves, so the path always exists
            path: tree.path(leaf_index).unwrap_or_default(),
            root,
            anchor: anchor.clone(),
        })
        .collect()
}

/// Fold a leaf digest with its sibling path.
pub fn recompute_root(target: &Digest, path: &[ProofStep]) -> Digest {
    path.iter().fold(*target, |current, step| match step.position {
        Position::Left => hash_pair(&step.sibling, &current),
        Position::Right => hash_pair(&current, &step.sibling),
    })
}

/// Check that a proof's path recomputes its stored root.
pub fn verify_proof(proof: &InclusionProof) -> bool {
    recompute_root(&proof.target, &proof.path) == proof.root
}

pub const MERKLE_PROOF_TYPE: &str = "MerkleProof2017";
pub const ETH_ANCHOR_TYPE: &str = "ETHData";

/// Blockcerts v2 `signature` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof2017 {
    #[serde(rename = "type")]
    pub proof_type: Vec<String>,
    pub merkle_root: String,
    pub target_hash: String,
    pub proof: Vec<PathEntry>,
    pub anchors: Vec<AnchorEntry>,
}

/// `{"left": hex}` or `{"right": hex}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathEntry {
    Left(String),
    Right(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorEntry {
    pub source_id: String,
    #[serde(rename = "type")]
    pub anchor_type: String,
    pub chain: String,
}

impl InclusionProof {
    /// Render the proof in the form attached to each credential.
    pub fn to_signature(&self) -> MerkleProof2017 {
        MerkleProof2017 {
            proof_type: vec![MERKLE_PROOF_TYPE.to_string(), "Extension".to_string()],
            merkle_root: hex::encode(self.root),
            target_hash: hex::encode(self.target),
            proof: self
                .path
                .iter()
                .map(|step| match step.position {
                    Position::Left => PathEntry::Left(hex::encode(step.sibling)),
                    Position::Right => PathEntry::Right(hex::encode(step.sibling)),
                })
                .collect(),
            anchors: vec![AnchorEntry {
                source_id: self.anchor.tx_id.clone(),
                anchor_type: ETH_ANCHOR_TYPE.to_string(),
                chain: self.anchor.chain.blockcerts_name().to_string(),
            }],
        }
    }
}

/// Check an attached signature without the tree: the path must lead from
/// `targetHash` to `merkleRoot`.
pub fn verify_signature(signature: &MerkleProof2017) -> Result<bool> {
    if !signature.proof_type.iter().any(|t| t == MERKLE_PROOF_TYPE) {
        return Err(AnchorError::Input(format!(
            "unsupported signature type {:?}",
            signature.proof_type
        )));
    }

    let target = decode_digest(&signature.target_hash)?;
    let root = decode_digest(&signature.merkle_root)?;
    let path = signature
        .proof
        .iter()
        .map(|entry| {
            Ok(match entry {
                PathEntry::Left(h) => ProofStep {
                    sibling: decode_digest(h)?,
                    position: Position::Left,
                },
                PathEntry::Right(h) => ProofStep {
                    sibling: decode_digest(h)?,
                    position: Position::Right,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(recompute_root(&target, &path) == root)
}

fn decode_digest(value: &str) -> Result<Digest> {
    let bytes = hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| AnchorError::Input(format!("invalid hex digest {value:?}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AnchorError::Input(format!("digest {value:?} is not 32 bytes")))
}
