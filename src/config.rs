/// Issuer configuration.
///
/// Defaults mirror what a single anchoring transaction on Ethereum needs:
/// 20 gwei gas price, 25 000 gas, three attempts, burn-address receiver.
/// Values can be loaded from the environment; node endpoints are selected
/// here so the anchoring core only ever sees one node.
use std::env;
use std::path::PathBuf;

use alloy::primitives::Address;
use rand::seq::SliceRandom;

use crate::anchor::{Chain, BURN_ADDRESS};
use crate::anchor::transaction::FeeParams;
use crate::crypto::keys::{KeySource, DEFAULT_KEY_PATH};
use crate::crypto::sensitive::SensitiveString;
use crate::error::{AnchorError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Prefix some issuer profiles put in front of the public key.
const PUBLIC_KEY_PREFIX: &str = "ecdsa-koblitz-pubkey:";

/// Everything the broadcaster needs to anchor one batch.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub chain: Chain,
    /// Sender of the anchoring transaction; must match the signing key.
    pub issuing_address: Address,
    /// Receiver of the anchoring transaction.
    pub sink: Address,
    pub key: KeySource,
    /// Base fees for the first attempt.
    pub fees: FeeParams,
    /// Total submissions allowed, counting the first.
    pub max_attempts: u32,
}

impl IssuerConfig {
    pub fn new(chain: Chain, issuing_address: Address, key: KeySource) -> Self {
        Self {
            chain,
            issuing_address,
            sink: burn_address(),
            key,
            fees: FeeParams::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Load from environment variables:
    ///
    /// - `ETH_PUBLIC_KEY` (required): issuing address, optionally prefixed
    ///   with `ecdsa-koblitz-pubkey:`
    /// - `ETH_PRIVATE_KEY`: inline key; otherwise the key file is used
    /// - `ETH_PRIVATE_KEY_PATH`: key file, default `/app/temp/keyring/eth_private_key`
    /// - `ETH_GAS_PRICE`, `ETH_GAS_LIMIT`, `ETH_MAX_ATTEMPTS`
    pub fn from_env(chain: Chain) -> Result<Self> {
        let public_key = env::var("ETH_PUBLIC_KEY")
            .map_err(|_| AnchorError::Config("ETH_PUBLIC_KEY is not set".into()))?;
        let issuing_address = parse_issuing_address(&public_key)?;

        let key_path = env::var("ETH_PRIVATE_KEY_PATH").unwrap_or_else(|_| DEFAULT_KEY_PATH.into());
        let inline = env::var("ETH_PRIVATE_KEY").ok().map(SensitiveString::new);
        let key = KeySource::inline_or_file(inline, PathBuf::from(key_path));

        let mut config = Self::new(chain, issuing_address, key);
        if let Some(gas_price) = env_number::<u128>("ETH_GAS_PRICE")? {
            config.fees.gas_price = gas_price;
        }
        if let Some(gas_limit) = env_number::<u64>("ETH_GAS_LIMIT")? {
            config.fees.gas_limit = gas_limit;
        }
        if let Some(max_attempts) = env_number::<u32>("ETH_MAX_ATTEMPTS")? {
            config.max_attempts = max_attempts;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AnchorError::Config("max_attempts must be at least 1".into()));
        }
        if self.fees.gas_price == 0 || self.fees.gas_limit == 0 {
            return Err(AnchorError::Config(
                "gas price and gas limit must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Accept `0x…` or `ecdsa-koblitz-pubkey:0x…`.
pub fn parse_issuing_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let address = trimmed.strip_prefix(PUBLIC_KEY_PREFIX).unwrap_or(trimmed);
    address
        .parse()
        .map_err(|e| AnchorError::Config(format!("invalid issuing address {address:?}: {e}")))
}

fn burn_address() -> Address {
    // constant is a valid 20-byte hex address
    BURN_ADDRESS.parse().unwrap_or(Address::ZERO)
}

fn env_number<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AnchorError::Config(format!("{name}={value:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Pick one node URL for `chain` from `ETH_NODE_URL_<NETWORK>`, which may
/// hold a comma-separated list.
pub fn node_url_from_env(chain: Chain) -> Result<String> {
    let var = format!("ETH_NODE_URL_{}", chain.network().to_ascii_uppercase());
    let value = env::var(&var).map_err(|_| AnchorError::Config(format!("{var} is not set")))?;
    pick_endpoint(&value).ok_or_else(|| AnchorError::Config(format!("{var} lists no endpoints")))
}

/// Random entry of a comma-separated endpoint list.
pub fn pick_endpoint(csv: &str) -> Option<String> {
    let urls: Vec<&str> = csv
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .collect();
    urls.choose(&mut rand::thread_rng()).map(|u| u.to_string())
}
