/// Scripted in-memory node for broadcaster and pipeline tests.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, U256};
use async_trait::async_trait;

use super::EthereumNode;
use crate::error::{AnchorError, Result};

pub(crate) const TEST_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub(crate) const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub(crate) struct MockNode {
    balance: U256,
    nonce: u64,
    failures_left: Mutex<u32>,
    rpc_failures: bool,
    pub submissions: Mutex<Vec<Vec<u8>>>,
    pub nonce_queries: AtomicU32,
    pub balance_queries: AtomicU32,
}

impl MockNode {
    /// A funded account whose first `failures` submissions are rejected.
    pub fn failing(nonce: u64, failures: u32) -> Self {
        Self {
            balance: U256::from(10u128.pow(18)),
            nonce,
            failures_left: Mutex::new(failures),
            rpc_failures: false,
            submissions: Mutex::new(Vec::new()),
            nonce_queries: AtomicU32::new(0),
            balance_queries: AtomicU32::new(0),
        }
    }

    pub fn healthy(nonce: u64) -> Self {
        Self::failing(nonce, 0)
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    /// Report rejected submissions as transport errors instead.
    pub fn with_rpc_failures(mut self) -> Self {
        self.rpc_failures = true;
        self
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl EthereumNode for MockNode {
    fn endpoint(&self) -> &str {
        "mock://node"
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce)
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String> {
        self.submissions.lock().unwrap().push(raw.to_vec());

        let mut failures_left = self.failures_left.lock().unwrap();
        if *failures_left > 0 {
            *failures_left -= 1;
            if self.rpc_failures {
                return Err(AnchorError::Rpc("connection reset".into()));
            }
            return Err(AnchorError::Submission(
                "replacement transaction underpriced".into(),
            ));
        }
        Ok(format!("0x{}", hex::encode(keccak256(raw))))
    }
}
