/// Blockchain anchoring of a batch Merkle root.
///
/// The root is written as calldata of a single zero-value transaction to
/// a burn address. This module holds the chain selector, the anchoring
/// metadata attached to every proof, and the node boundary the
/// broadcaster talks to.
///
/// Endpoint selection (including fallback among several nodes for one
/// chain) happens before a node is handed in; see `config`.
pub mod broadcaster;
pub mod rpc;
pub mod sequencer;
pub mod transaction;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AnchorError, Result};

/// Receiver of anchoring transactions. Nothing sent here is ever spent.
pub const BURN_ADDRESS: &str = "0xdeaDDeADDEaDdeaDdEAddEADDEAdDeadDEADDEaD";

/// Network a batch is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    EthereumMainnet,
    EthereumRopsten,
    EthereumGoerli,
    EthereumSepolia,
}

impl Chain {
    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::EthereumMainnet => 1,
            Chain::EthereumRopsten => 3,
            Chain::EthereumGoerli => 5,
            Chain::EthereumSepolia => 11_155_111,
        }
    }

    /// Network part of the selector ("mainnet", "ropsten", ...).
    pub fn network(&self) -> &'static str {
        match self {
            Chain::EthereumMainnet => "mainnet",
            Chain::EthereumRopsten => "ropsten",
            Chain::EthereumGoerli => "goerli",
            Chain::EthereumSepolia => "sepolia",
        }
    }

    /// Chain name used in Blockcerts anchors.
    pub fn blockcerts_name(&self) -> &'static str {
        match self {
            Chain::EthereumMainnet => "ethereumMainnet",
            Chain::EthereumRopsten => "ethereumRopsten",
            Chain::EthereumGoerli => "ethereumGoerli",
            Chain::EthereumSepolia => "ethereumSepolia",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::EthereumMainnet => "ethereum_mainnet",
            Chain::EthereumRopsten => "ethereum_ropsten",
            Chain::EthereumGoerli => "ethereum_goerli",
            Chain::EthereumSepolia => "ethereum_sepolia",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum_mainnet" | "mainnet" => Ok(Chain::EthereumMainnet),
            "ethereum_ropsten" | "ropsten" => Ok(Chain::EthereumRopsten),
            "ethereum_goerli" | "goerli" => Ok(Chain::EthereumGoerli),
            "ethereum_sepolia" | "sepolia" => Ok(Chain::EthereumSepolia),
            other => Err(AnchorError::Config(format!("unsupported chain {other:?}"))),
        }
    }
}

/// Where a batch root was anchored. Attached to every proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorMetadata {
    pub chain: Chain,
    /// Transaction hash, 0x-prefixed hex.
    pub tx_id: String,
}

/// The calls the broadcaster makes against a node of the selected chain.
#[async_trait]
pub trait EthereumNode: Send + Sync {
    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;

    /// Number of transactions sent from `address` (the next nonce).
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    /// Balance of `address` in wei.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Submit a signed, RLP-encoded transaction. Returns the transaction hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_round_trip_through_selector() {
        for chain in [
            Chain::EthereumMainnet,
            Chain::EthereumRopsten,
            Chain::EthereumGoerli,
            Chain::EthereumSepolia,
        ] {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), chain);
        }
    }

    #[test]
    fn test_chain_accepts_bare_network() {
        assert_eq!("Ropsten".parse::<Chain>().unwrap(), Chain::EthereumRopsten);
        assert_eq!(Chain::EthereumSepolia.chain_id(), 11_155_111);
    }

    #[test]
    fn test_unknown_chain_is_config_error() {
        assert!(matches!(
            "bitcoin_mainnet".parse::<Chain>(),
            Err(AnchorError::Config(_))
        ));
    }

    #[test]
    fn test_burn_address_parses() {
        assert!(BURN_ADDRESS.parse::<Address>().is_ok());
    }

    #[test]
    fn test_chain_serializes_as_selector() {
        assert_eq!(
            serde_json::to_string(&Chain::EthereumMainnet).unwrap(),
            "\"ethereum_mainnet\""
        );
    }
}
