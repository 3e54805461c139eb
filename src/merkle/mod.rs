/// SHA-256 Merkle commitment over a batch of documents.
///
/// `tree` builds the commitment, `proof` derives one inclusion proof per
/// leaf and serializes it as a Blockcerts `MerkleProof2017` signature.
pub mod proof;
pub mod tree;

pub use proof::{generate_proofs, verify_proof, InclusionProof, Position, ProofStep};
pub use tree::MerkleTree;
