/// Anchoring transaction construction and signing.
///
/// The transaction is a legacy (EIP-155) transfer of zero value to the
/// burn address with the 32-byte Merkle root as calldata.
use std::fmt;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy::signers::SignerSync;

use crate::crypto::hash::Digest;
use crate::crypto::keys::KeySource;
use crate::error::{AnchorError, Result};

/// Gas price and gas limit for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    /// Wei per unit of gas.
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl FeeParams {
    pub const DEFAULT_GAS_PRICE: u128 = 20_000_000_000;
    pub const DEFAULT_GAS_LIMIT: u64 = 25_000;

    pub fn new(gas_price: u128, gas_limit: u64) -> Self {
        Self {
            gas_price,
            gas_limit,
        }
    }

    /// Highest cost of one transaction at these fees.
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_price) * U256::from(self.gas_limit)
    }

    /// Fees for 0-based attempt `attempt`: each value scaled by
    /// `1 + attempt/10`, truncated. Attempt 0 returns the base fees.
    pub fn escalated(&self, attempt: u32) -> Self {
        let gas_limit = escalate(u128::from(self.gas_limit), attempt);
        Self {
            gas_price: escalate(self.gas_price, attempt),
            gas_limit: u64::try_from(gas_limit).unwrap_or(u64::MAX),
        }
    }
}

impl Default for FeeParams {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GAS_PRICE, Self::DEFAULT_GAS_LIMIT)
    }
}

/// `floor(value * (1 + attempt/10))` in integer arithmetic, saturating at
/// `u128::MAX`. Never returns less than `value`.
pub fn escalate(value: u128, attempt: u32) -> u128 {
    let factor = 10 + u128::from(attempt);
    match value.checked_mul(factor) {
        Some(scaled) => scaled / 10,
        None => (value / 10).saturating_mul(factor).max(value),
    }
}

/// One unsigned anchoring transaction. Built fresh per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub nonce: u64,
    pub fees: FeeParams,
    pub data: Bytes,
}

impl TransactionRequest {
    /// Request for attempt `attempt`, derived from the base nonce and fees.
    pub fn for_attempt(
        chain_id: u64,
        from: Address,
        to: Address,
        merkle_root: &Digest,
        base_nonce: u64,
        base_fees: FeeParams,
        attempt: u32,
    ) -> Result<Self> {
        let nonce = base_nonce.checked_add(u64::from(attempt)).ok_or_else(|| {
            AnchorError::Rpc(format!(
                "nonce {base_nonce} cannot be offset by attempt {attempt}"
            ))
        })?;
        Ok(Self {
            chain_id,
            from,
            to,
            value: U256::ZERO,
            nonce,
            fees: base_fees.escalated(attempt),
            data: Bytes::copy_from_slice(merkle_root),
        })
    }

    /// Sign with the key from `key`. The key is held only for this call.
    pub fn sign(&self, key: &KeySource) -> Result<SignedTransaction> {
        let guard = key.acquire()?;
        let signer = guard.signer()?;

        if signer.address() != self.from {
            return Err(AnchorError::Signing(format!(
                "private key belongs to {}, not the issuing address {}",
                signer.address(),
                self.from
            )));
        }

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.fees.gas_price,
            gas_limit: self.fees.gas_limit,
            to: TxKind::Call(self.to),
            value: self.value,
            input: self.data.clone(),
        };

        let sig = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| AnchorError::Signing(format!("ETH signing failed: {e}")))?;

        let signed = TxEnvelope::Legacy(tx.into_signed(sig));

        let mut raw = Vec::new();
        signed.encode_2718(&mut raw);
        let hash = keccak256(&raw);

        Ok(SignedTransaction { raw, hash })
    }
}

/// RLP-encoded signed transaction, ready for `eth_sendRawTransaction`.
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: B256,
}

impl SignedTransaction {
    /// Transaction hash as 0x-prefixed hex.
    pub fn tx_id(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("hash", &self.hash)
            .field("raw_len", &self.raw.len())
            .finish()
    }
}
