/// Transaction broadcaster: one instance per batch.
///
/// ```text
/// PREFLIGHT ─▶ BUILD ─▶ SIGN ─▶ SUBMIT ─┬─▶ SUCCESS
///                ▲                      ├─▶ RETRY ─▶ BUILD (attempts left)
///                └──────────────────────┘   └─────▶ FATAL (exhausted)
/// ```
///
/// Only SUBMIT failures are retried. Insufficient balance, node query
/// failures and signing failures end the machine immediately. Attempt `i`
/// reuses the nonce queried on the first BUILD offset by `i`, with gas
/// price and limit scaled by `1 + i/10`, so a stuck transaction is
/// replaced by a better-paying one at the next nonce.
///
/// One batch per signing account may be in flight at a time. Callers
/// anchoring several batches from one account must serialize them, see
/// `sequencer::AccountSequencer`.
use tracing::{error, info, warn};

use super::transaction::{FeeParams, SignedTransaction, TransactionRequest};
use super::EthereumNode;
use crate::config::IssuerConfig;
use crate::crypto::hash::Digest;
use crate::error::{AnchorError, Result};

/// What happened on one pass through BUILD → SIGN → SUBMIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastAttempt {
    /// 0-based attempt index.
    pub index: u32,
    pub nonce: u64,
    pub fees: FeeParams,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Submitted { tx_id: String },
    Failed { reason: String },
}

/// Successful broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastReport {
    pub tx_id: String,
    pub attempts: Vec<BroadcastAttempt>,
}

enum State {
    Preflight,
    Build {
        attempt: u32,
    },
    Sign {
        attempt: u32,
        request: TransactionRequest,
    },
    Submit {
        attempt: u32,
        request: TransactionRequest,
        signed: SignedTransaction,
    },
    Retry {
        attempt: u32,
        cause: AnchorError,
    },
    Success {
        tx_id: String,
    },
    Fatal(AnchorError),
}

pub struct Broadcaster<'a> {
    config: &'a IssuerConfig,
    node: &'a dyn EthereumNode,
}

impl<'a> Broadcaster<'a> {
    pub fn new(config: &'a IssuerConfig, node: &'a dyn EthereumNode) -> Self {
        Self { config, node }
    }

    /// Anchor `merkle_root`, returning the transaction id of the one
    /// accepted submission.
    pub async fn broadcast(&self, merkle_root: &Digest) -> Result<BroadcastReport> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts: Vec<BroadcastAttempt> = Vec::new();
        let mut base_nonce: Option<u64> = None;
        let mut state = State::Preflight;

        loop {
            state = match state {
                State::Preflight => match self.preflight().await {
                    Ok(()) => State::Build { attempt: 0 },
                    Err(e) => State::Fatal(e),
                },

                State::Build { attempt } => {
                    let request = self.nonce(&mut base_nonce).await.and_then(|nonce| {
                        TransactionRequest::for_attempt(
                            self.config.chain.chain_id(),
                            self.config.issuing_address,
                            self.config.sink,
                            merkle_root,
                            nonce,
                            self.config.fees,
                            attempt,
                        )
                    });
                    match request {
                        Ok(request) => State::Sign { attempt, request },
                        Err(e) => State::Fatal(e),
                    }
                }

                State::Sign { attempt, request } => match request.sign(&self.config.key) {
                    Ok(signed) => State::Submit {
                        attempt,
                        request,
                        signed,
                    },
                    Err(e) => State::Fatal(e),
                },

                State::Submit {
                    attempt,
                    request,
                    signed,
                } => {
                    info!(
                        chain = %self.config.chain,
                        attempt,
                        nonce = request.nonce,
                        gas_price = request.fees.gas_price,
                        gas_limit = request.fees.gas_limit,
                        endpoint = self.node.endpoint(),
                        "Submitting anchoring transaction"
                    );

                    let outcome = self.node.send_raw_transaction(&signed.raw).await;
                    let (next, outcome) = match outcome {
                        Ok(tx_id) => {
                            if !tx_id.eq_ignore_ascii_case(&signed.tx_id()) {
                                warn!(
                                    node_tx_id = %tx_id,
                                    local_tx_id = %signed.tx_id(),
                                    "Node reported a different transaction hash"
                                );
                            }
                            (
                                State::Success {
                                    tx_id: tx_id.clone(),
                                },
                                AttemptOutcome::Submitted { tx_id },
                            )
                        }
                        Err(e) => {
                            let cause = if e.is_retryable() {
                                e
                            } else {
                                AnchorError::Submission(e.to_string())
                            };
                            let reason = cause.to_string();
                            (State::Retry { attempt, cause }, AttemptOutcome::Failed { reason })
                        }
                    };

                    attempts.push(BroadcastAttempt {
                        index: attempt,
                        nonce: request.nonce,
                        fees: request.fees,
                        outcome,
                    });
                    next
                }

                State::Retry { attempt, cause } => {
                    let used = attempt + 1;
                    if used < max_attempts {
                        warn!(
                            attempt,
                            remaining = max_attempts - used,
                            error = %cause,
                            "Submission failed, retrying with escalated fees"
                        );
                        State::Build { attempt: used }
                    } else {
                        State::Fatal(AnchorError::BroadcastExhausted {
                            attempts: used,
                            source: Box::new(cause),
                        })
                    }
                }

                State::Success { tx_id } => {
                    info!(
                        chain = %self.config.chain,
                        tx_id = %tx_id,
                        attempts = attempts.len(),
                        "Anchoring transaction accepted"
                    );
                    return Ok(BroadcastReport { tx_id, attempts });
                }

                State::Fatal(e) => {
                    error!(
                        chain = %self.config.chain,
                        stage = e.stage(),
                        error = %e,
                        "Anchoring failed"
                    );
                    return Err(e);
                }
            };
        }
    }

    /// Refuse to build anything the account cannot pay for.
    async fn preflight(&self) -> Result<()> {
        let required = self.config.fees.max_cost();
        let balance = self.node.balance(self.config.issuing_address).await?;

        if balance < required {
            return Err(AnchorError::InsufficientFunds {
                balance: balance.to_string(),
                required: required.to_string(),
            });
        }
        Ok(())
    }

    /// Base nonce, queried once per broadcast.
    async fn nonce(&self, base_nonce: &mut Option<u64>) -> Result<u64> {
        if let Some(nonce) = base_nonce {
            return Ok(*nonce);
        }
        let nonce = self
            .node
            .transaction_count(self.config.issuing_address)
            .await?;
        *base_nonce = Some(nonce);
        Ok(nonce)
    }
}
