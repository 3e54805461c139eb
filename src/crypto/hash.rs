/// SHA-256 hashing for leaf digests and Merkle parents.
///
/// Blockcerts `MerkleProof2017` verifiers expect plain SHA-256 with no
/// domain prefix:
///   leaf   = SHA256(normalized document bytes)
///   parent = SHA256(left || right)
use sha2::{Digest as _, Sha256};

use crate::error::{AnchorError, Result};

/// A 32-byte SHA-256 digest.
pub type Digest = [u8; 32];

/// Hash arbitrary data with SHA-256.
pub fn hash(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Hash one normalized document into its leaf digest.
///
/// An empty byte string means the normalizer produced nothing, which is a
/// precondition violation rather than a document.
pub fn leaf_digest(normalized: &[u8]) -> Result<Digest> {
    if normalized.is_empty() {
        return Err(AnchorError::Input(
            "normalized document is empty".to_string(),
        ));
    }
    Ok(hash(normalized))
}

/// Hash two child digests to produce their parent.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
