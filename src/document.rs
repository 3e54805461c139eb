/// Credentials going into and coming out of a batch.
///
/// Canonicalization (JSON-LD normalization) happens upstream; a document
/// arrives here with its normalized form already computed and is never
/// changed after its digest is taken.
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::merkle::proof::{InclusionProof, MerkleProof2017};
use crate::error::{AnchorError, Result};

/// A credential awaiting anchoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedDocument {
    /// Identity of the credential within the batch.
    pub id: String,
    /// Credential body, returned unchanged apart from the attached signature.
    pub content: serde_json::Value,
    /// Canonical form produced by the external normalizer.
    pub normalized: String,
}

impl UnsignedDocument {
    pub fn new(id: impl Into<String>, content: serde_json::Value, normalized: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content,
            normalized: normalized.into(),
        }
    }

    pub fn normalized_bytes(&self) -> &[u8] {
        self.normalized.as_bytes()
    }

    /// Attach a proof, producing the signed credential.
    pub(crate) fn sign(self, proof: InclusionProof) -> SignedDocument {
        SignedDocument {
            id: self.id,
            content: self.content,
            proof,
        }
    }
}

/// A credential with its inclusion proof attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedDocument {
    pub id: String,
    pub content: serde_json::Value,
    pub proof: InclusionProof,
}

impl SignedDocument {
    /// The credential JSON with the proof under `signature`.
    ///
    /// Content is checked to be a JSON object before anchoring, so the
    /// signature always has a place to go.
    pub fn to_json(&self) -> serde_json::Value {
        let mut content = self.content.clone();
        if let Some(object) = content.as_object_mut() {
            object.insert("signature".to_string(), json!(self.proof.to_signature()));
        }
        content
    }
}

/// Read the attached signature back out of a signed credential.
pub fn signature_of(credential: &serde_json::Value) -> Result<MerkleProof2017> {
    let signature = credential
        .get("signature")
        .ok_or_else(|| AnchorError::Input("credential has no signature".into()))?;
    Ok(serde_json::from_value(signature.clone())?)
}
