/// Ethereum JSON-RPC node client.
///
/// Uses raw JSON-RPC over HTTP for maximum compatibility with hosted
/// providers (Infura, Alchemy) and local nodes alike.
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::EthereumNode;
use crate::error::{AnchorError, Result};

/// A single node endpoint.
pub struct JsonRpcNode {
    url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcNode {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }

    /// Send a JSON-RPC request to the node.
    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!(method, endpoint = %self.url, "RPC call");

        let resp: JsonRpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnchorError::Rpc(format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| AnchorError::Serialization(format!("{method} response parse error: {e}")))?;

        if let Some(err) = resp.error {
            return Err(AnchorError::Rpc(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }

        resp.result
            .ok_or_else(|| AnchorError::Rpc(format!("{method}: empty RPC response")))
    }
}

#[async_trait]
impl EthereumNode for JsonRpcNode {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        let count_hex: String = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([format!("{address:?}"), "latest"]),
            )
            .await?;
        parse_quantity_u64(&count_hex)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        let balance_hex: String = self
            .rpc_call(
                "eth_getBalance",
                serde_json::json!([format!("{address:?}"), "latest"]),
            )
            .await?;
        U256::from_str_radix(balance_hex.trim_start_matches("0x"), 16)
            .map_err(|e| AnchorError::Rpc(format!("invalid balance {balance_hex:?}: {e}")))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String> {
        let raw_hex = format!("0x{}", hex::encode(raw));
        // Any failure here is a submission failure, which the broadcaster may retry.
        self.rpc_call("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await
            .map_err(|e| AnchorError::Submission(e.to_string()))
    }
}

fn parse_quantity_u64(value: &str) -> Result<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| AnchorError::Rpc(format!("invalid quantity {value:?}: {e}")))
}
