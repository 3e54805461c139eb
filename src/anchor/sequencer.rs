/// Per-account serialization of anchoring.
///
/// The signing account's nonce is the one piece of shared mutable state
/// across batches. Two batches broadcasting from the same account at once
/// would both read the same transaction count and collide. Holding the
/// account's lease for the whole broadcast queues them instead.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Hands out one async lock per signing address.
#[derive(Default, Clone)]
pub struct AccountSequencer {
    locks: Arc<Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>>,
}

/// Exclusive right to broadcast from one account. Released on drop.
pub struct AccountLease {
    pub address: Address,
    _guard: OwnedMutexGuard<()>,
}

impl AccountSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other batch holds `address`, then take it.
    pub async fn acquire(&self, address: Address) -> AccountLease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(address).or_default().clone()
        };
        debug!(account = %address, "Waiting for account lease");
        let guard = lock.lock_owned().await;
        AccountLease {
            address,
            _guard: guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_account_is_serialized() {
        let sequencer = AccountSequencer::new();
        let address = Address::repeat_byte(0x11);

        let first = sequencer.acquire(address).await;
        let waiting = {
            let sequencer = sequencer.clone();
            tokio::spawn(async move { sequencer.acquire(address).await.address })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(first);
        assert_eq!(waiting.await.unwrap(), address);
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let sequencer = AccountSequencer::new();
        let _a = sequencer.acquire(Address::repeat_byte(0x01)).await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            sequencer.acquire(Address::repeat_byte(0x02)),
        )
        .await;
        assert!(b.is_ok());
    }
}
