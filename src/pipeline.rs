/// Batch issuing orchestrator.
///
/// Coordinates the full issuing flow:
/// 1. Hash each normalized document into a leaf digest (batch order)
/// 2. Build the SHA-256 Merkle tree
/// 3. Broadcast one transaction carrying the root
/// 4. Derive one inclusion proof per leaf for that transaction
/// 5. Attach each proof to its document
///
/// Either every document comes back signed after one accepted
/// transaction, or the call fails and nothing is signed.
use std::collections::HashSet;

use tracing::info;

use crate::anchor::broadcaster::{BroadcastAttempt, Broadcaster};
use crate::anchor::sequencer::AccountSequencer;
use crate::anchor::{AnchorMetadata, EthereumNode};
use crate::config::IssuerConfig;
use crate::crypto::hash::{leaf_digest, Digest};
use crate::document::{SignedDocument, UnsignedDocument};
use crate::error::{AnchorError, Result};
use crate::merkle::proof::{generate_proofs, verify_proof};
use crate::merkle::tree::MerkleTree;

/// Result of an anchored batch.
#[derive(Debug)]
pub struct IssuedBatch {
    pub tx_id: String,
    pub merkle_root: Digest,
    /// Broadcast attempts, the last one accepted.
    pub attempts: Vec<BroadcastAttempt>,
    /// Signed documents in input order.
    pub documents: Vec<SignedDocument>,
}

impl IssuedBatch {
    /// Look up a signed document by id.
    pub fn get(&self, id: &str) -> Option<&SignedDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Signed credentials as JSON, in input order.
    pub fn credentials(&self) -> Vec<serde_json::Value> {
        self.documents.iter().map(SignedDocument::to_json).collect()
    }
}

/// Documents hashed and committed, not yet anchored.
#[derive(Debug)]
pub struct PreparedBatch {
    documents: Vec<UnsignedDocument>,
    tree: MerkleTree,
}

impl PreparedBatch {
    pub fn merkle_root(&self) -> Digest {
        self.tree.root()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Hash the documents and build the tree.
pub fn prepare_batch(documents: Vec<UnsignedDocument>) -> Result<PreparedBatch> {
    if documents.is_empty() {
        return Err(AnchorError::Input("batch contains no documents".into()));
    }

    let mut seen = HashSet::with_capacity(documents.len());
    for doc in &documents {
        if !doc.content.is_object() {
            return Err(AnchorError::Input(format!(
                "document {} content is not a JSON object",
                doc.id
            )));
        }
        if !seen.insert(doc.id.as_str()) {
            return Err(AnchorError::Input(format!(
                "document id {} appears more than once",
                doc.id
            )));
        }
    }

    let leaves = documents
        .iter()
        .map(|doc| {
            leaf_digest(doc.normalized_bytes())
                .map_err(|e| AnchorError::Input(format!("document {}: {e}", doc.id)))
        })
        .collect::<Result<Vec<_>>>()?;

    let tree = MerkleTree::from_leaf_hashes(leaves)?;

    info!(
        leaves = tree.leaf_count(),
        root = %hex::encode(tree.root()),
        "Merkle tree built"
    );

    Ok(PreparedBatch { documents, tree })
}

/// Attach one proof per document for the accepted transaction.
fn attach_proofs(prepared: PreparedBatch, anchor: &AnchorMetadata) -> Result<Vec<SignedDocument>> {
    let proofs = generate_proofs(&prepared.tree, anchor);

    prepared
        .documents
        .into_iter()
        .zip(proofs)
        .map(|(doc, proof)| {
            if !verify_proof(&proof) {
                return Err(AnchorError::ProofConsistency(proof.leaf_index));
            }
            Ok(doc.sign(proof))
        })
        .collect()
}

/// Anchor a prepared batch and sign its documents.
pub async fn anchor_prepared(
    prepared: PreparedBatch,
    config: &IssuerConfig,
    node: &dyn EthereumNode,
) -> Result<IssuedBatch> {
    config.validate()?;

    let merkle_root = prepared.merkle_root();
    let report = Broadcaster::new(config, node).broadcast(&merkle_root).await?;

    let anchor = AnchorMetadata {
        chain: config.chain,
        tx_id: report.tx_id.clone(),
    };
    let documents = attach_proofs(prepared, &anchor)?;

    info!(
        chain = %config.chain,
        tx_id = %report.tx_id,
        documents = documents.len(),
        "Batch issued"
    );

    Ok(IssuedBatch {
        tx_id: report.tx_id,
        merkle_root,
        attempts: report.attempts,
        documents,
    })
}

/// Issue a batch: hash, commit, anchor, attach proofs.
///
/// Assumes no other batch is broadcasting from `config.issuing_address`
/// at the same time; concurrent batches for one account must go through
/// [`issue_batch_serialized`].
pub async fn issue_batch(
    documents: Vec<UnsignedDocument>,
    config: &IssuerConfig,
    node: &dyn EthereumNode,
) -> Result<IssuedBatch> {
    let prepared = prepare_batch(documents)?;
    anchor_prepared(prepared, config, node).await
}

/// Like [`issue_batch`], but waits for the issuing account to be free.
/// Hashing and tree building happen before the wait.
pub async fn issue_batch_serialized(
    documents: Vec<UnsignedDocument>,
    config: &IssuerConfig,
    node: &dyn EthereumNode,
    sequencer: &AccountSequencer,
) -> Result<IssuedBatch> {
    let prepared = prepare_batch(documents)?;
    let _lease = sequencer.acquire(config.issuing_address).await;
    anchor_prepared(prepared, config, node).await
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use serde_json::json;

    use super::*;
    use crate::anchor::mock::{MockNode, TEST_ADDRESS, TEST_KEY};
    use crate::anchor::Chain;
    use crate::crypto::keys::KeySource;
    use crate::crypto::sensitive::SensitiveString;
    use crate::merkle::proof::verify_signature;

    fn config() -> IssuerConfig {
        IssuerConfig::new(
            Chain::EthereumRopsten,
            TEST_ADDRESS.parse().unwrap(),
            KeySource::Inline(SensitiveString::from(TEST_KEY)),
        )
    }

    fn batch(n: usize) -> Vec<UnsignedDocument> {
        (0..n)
            .map(|i| {
                UnsignedDocument::new(
                    format!("urn:uuid:{i}"),
                    json!({ "id": format!("urn:uuid:{i}"), "recipient": { "name": format!("R{i}") } }),
                    format!("<urn:uuid:{i}> <http://schema.org/name> \"R{i}\" .\n"),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_issue_three_documents() {
        let config = config();
        let node = MockNode::healthy(0);
        let issued = issue_batch(batch(3), &config, &node).await.unwrap();

        assert_eq!(issued.documents.len(), 3);
        assert_eq!(node.submission_count(), 1);
        for (i, doc) in issued.documents.iter().enumerate() {
            assert_eq!(doc.id, format!("urn:uuid:{i}"));
            assert_eq!(doc.proof.leaf_index, i);
            assert_eq!(doc.proof.root, issued.merkle_root);
            assert_eq!(doc.proof.anchor.tx_id, issued.tx_id);
            assert_eq!(doc.proof.anchor.chain, Chain::EthereumRopsten);
            assert!(verify_proof(&doc.proof));
        }

        for credential in issued.credentials() {
            let signature = crate::document::signature_of(&credential).unwrap();
            assert!(verify_signature(&signature).unwrap());
        }
        assert!(issued.get("urn:uuid:2").is_some());
        assert!(issued.get("urn:uuid:9").is_none());
    }

    #[tokio::test]
    async fn test_single_document_root_is_its_digest() {
        let config = config();
        let node = MockNode::healthy(0);
        let docs = batch(1);
        let expected = leaf_digest(docs[0].normalized_bytes()).unwrap();

        let issued = issue_batch(docs, &config, &node).await.unwrap();
        assert_eq!(issued.merkle_root, expected);
        assert!(issued.documents[0].proof.path.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_payload_is_root() {
        use alloy::consensus::{Transaction, TxEnvelope};
        use alloy::eips::eip2718::Decodable2718;

        let config = config();
        let node = MockNode::healthy(0);
        let issued = issue_batch(batch(4), &config, &node).await.unwrap();

        let raw = node.submissions.lock().unwrap()[0].clone();
        let envelope = TxEnvelope::decode_2718(&mut raw.as_slice()).unwrap();
        assert_eq!(envelope.input().as_ref(), &issued.merkle_root[..]);
    }

    #[tokio::test]
    async fn test_retry_then_success_signs_with_final_tx() {
        let config = config();
        let node = MockNode::failing(5, 2);
        let issued = issue_batch(batch(2), &config, &node).await.unwrap();

        assert_eq!(issued.attempts.len(), 3);
        assert_eq!(issued.attempts[2].nonce, 7);
        for doc in &issued.documents {
            assert_eq!(doc.proof.anchor.tx_id, issued.tx_id);
        }
    }

    #[tokio::test]
    async fn test_exhausted_broadcast_signs_nothing() {
        let config = config();
        let node = MockNode::failing(0, 3);
        let err = issue_batch(batch(3), &config, &node).await.unwrap_err();

        assert!(matches!(err, AnchorError::BroadcastExhausted { attempts: 3, .. }));
        assert_eq!(err.stage(), "submit");
    }

    #[tokio::test]
    async fn test_insufficient_funds_submits_nothing() {
        let config = config();
        let node = MockNode::healthy(0).with_balance(U256::from(1u8));
        let err = issue_batch(batch(2), &config, &node).await.unwrap_err();

        assert!(matches!(err, AnchorError::InsufficientFunds { .. }));
        assert_eq!(err.stage(), "preflight");
        assert_eq!(node.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let config = config();
        let node = MockNode::healthy(0);
        let err = issue_batch(vec![], &config, &node).await.unwrap_err();
        assert!(matches!(err, AnchorError::Input(_)));
        assert_eq!(node.balance_queries.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_normalized_document_rejected() {
        let mut docs = batch(2);
        docs[1].normalized.clear();
        assert!(matches!(prepare_batch(docs), Err(AnchorError::Input(_))));
    }

    #[tokio::test]
    async fn test_non_object_content_rejected_before_broadcast() {
        let config = config();
        let node = MockNode::healthy(0);
        let mut docs = batch(2);
        docs[1].content = json!([1, 2]);

        let err = issue_batch(docs, &config, &node).await.unwrap_err();
        assert!(matches!(err, AnchorError::Input(_)));
        assert_eq!(node.balance_queries.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(node.submission_count(), 0);
    }

    #[test]
    fn test_corrupted_tree_fails_proof_consistency() {
        let mut prepared = prepare_batch(batch(4)).unwrap();
        // leaves 0 and 1 only see the untouched parent of 2 and 3
        prepared.tree.levels[0][2] = [0xEE; 32];

        let anchor = AnchorMetadata {
            chain: Chain::EthereumRopsten,
            tx_id: "0x01".into(),
        };
        let result = attach_proofs(prepared, &anchor);
        assert!(matches!(result, Err(AnchorError::ProofConsistency(2))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut docs = batch(2);
        docs[1].id = docs[0].id.clone();
        assert!(matches!(prepare_batch(docs), Err(AnchorError::Input(_))));
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let a = prepare_batch(batch(5)).unwrap();
        let b = prepare_batch(batch(5)).unwrap();
        assert_eq!(a.merkle_root(), b.merkle_root());
        assert_eq!(a.len(), 5);
    }

    #[tokio::test]
    async fn test_serialized_batches_each_anchor() {
        let config = config();
        let node = MockNode::healthy(0);
        let sequencer = AccountSequencer::new();

        let first = issue_batch_serialized(batch(2), &config, &node, &sequencer)
            .await
            .unwrap();
        let second = issue_batch_serialized(batch(3), &config, &node, &sequencer)
            .await
            .unwrap();

        assert_ne!(first.tx_id, second.tx_id);
        assert_eq!(node.submission_count(), 2);
    }
}
