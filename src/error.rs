use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Insufficient funds: balance {balance} wei is below the required {required} wei")]
    InsufficientFunds { balance: String, required: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Broadcast failed after {attempts} attempt(s): {source}")]
    BroadcastExhausted {
        attempts: u32,
        #[source]
        source: Box<AnchorError>,
    },

    #[error("Merkle proof for leaf {0} does not recompute the batch root")]
    ProofConsistency(usize),

    #[error("Node RPC error: {0}")]
    Rpc(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AnchorError {
    /// Pipeline stage the error belongs to, for caller-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            AnchorError::Input(_) => "input",
            AnchorError::InsufficientFunds { .. } => "preflight",
            AnchorError::Signing(_) => "sign",
            AnchorError::Submission(_) | AnchorError::BroadcastExhausted { .. } => "submit",
            AnchorError::ProofConsistency(_) => "proof",
            AnchorError::Rpc(_) => "node",
            AnchorError::Config(_) => "config",
            AnchorError::Serialization(_) => "io",
        }
    }

    /// Only submission failures are retried by the broadcaster.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnchorError::Submission(_))
    }
}

impl From<serde_json::Error> for AnchorError {
    fn from(e: serde_json::Error) -> Self {
        AnchorError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_keeps_last_cause() {
        let err = AnchorError::BroadcastExhausted {
            attempts: 3,
            source: Box::new(AnchorError::Submission("nonce too low".into())),
        };
        assert_eq!(err.stage(), "submit");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("nonce too low"));
        assert!(err.to_string().contains("3 attempt"));
    }

    #[test]
    fn test_only_submission_is_retryable() {
        assert!(AnchorError::Submission("timeout".into()).is_retryable());
        assert!(!AnchorError::Signing("bad key".into()).is_retryable());
        assert!(!AnchorError::Rpc("down".into()).is_retryable());
    }
}
