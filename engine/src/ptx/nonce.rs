//! Per-signer nonce assignment (spec section 4.2, "Per-signer queue"). The
//! next nonce is fetched lazily on first use via a pluggable callback, held
//! in memory thereafter, and fast-forwarded whenever a confirmation shows
//! the base-ledger account nonce has moved past the local counter.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ptx::error::PtxError;

#[async_trait]
pub trait NextNonceCallback: Send + Sync {
    async fn next_nonce(&self, signer: &str) -> Result<u64, PtxError>;
}

/// Queries the signer's transaction count via an alloy provider. Exercised
/// in integration tests with a stub; production wiring passes an
/// RPC-backed implementation.
pub struct RpcNonceCallback {
    pub rpc_url: String,
}

#[async_trait]
impl NextNonceCallback for RpcNonceCallback {
    async fn next_nonce(&self, signer: &str) -> Result<u64, PtxError> {
        use alloy::providers::{Provider, ProviderBuilder};
        use std::str::FromStr;

        let url = self
            .rpc_url
            .parse()
            .map_err(|e| PtxError::NonceAssignment {
                signer: signer.to_string(),
                reason: format!("invalid rpc url: {e}"),
            })?;
        let provider = ProviderBuilder::new().on_http(url);
        let address =
            alloy::primitives::Address::from_str(signer).map_err(|e| PtxError::NonceAssignment {
                signer: signer.to_string(),
                reason: e.to_string(),
            })?;
        provider
            .get_transaction_count(address)
            .await
            .map_err(|e| PtxError::NonceAssignment {
                signer: signer.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Holds the next-to-assign nonce per signer, protected by a single mutex
/// per signer so concurrent batches for the same signer still serialise
/// ("a single critical section per signer").
pub struct NonceTracker {
    counters: Mutex<HashMap<String, u64>>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self { counters: Mutex::new(HashMap::new()) }
    }

    /// Returns the nonce to use for the next transaction from `signer`,
    /// fetching via the callback on first use and incrementing locally
    /// after.
    pub async fn assign(
        &self,
        signer: &str,
        callback: &dyn NextNonceCallback,
    ) -> Result<u64, PtxError> {
        let mut counters = self.counters.lock().await;
        if let Some(next) = counters.get_mut(signer) {
            let assigned = *next;
            *next += 1;
            return Ok(assigned);
        }
        let fetched = callback.next_nonce(signer).await?;
        counters.insert(signer.to_string(), fetched + 1);
        Ok(fetched)
    }

    /// Advances the local counter if `confirmed_nonce + 1` exceeds it,
    /// reconciling with an external replacement or a restart.
    pub async fn fast_forward(&self, signer: &str, confirmed_nonce: u64) {
        let mut counters = self.counters.lock().await;
        let entry = counters.entry(signer.to_string()).or_insert(confirmed_nonce + 1);
        if confirmed_nonce + 1 > *entry {
            *entry = confirmed_nonce + 1;
        }
    }
}

impl Default for NonceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedNonce(u64);

    #[async_trait]
    impl NextNonceCallback for FixedNonce {
        async fn next_nonce(&self, _signer: &str) -> Result<u64, PtxError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn assigns_strictly_increasing_nonces() {
        let tracker = NonceTracker::new();
        let callback = FixedNonce(5);
        let a = tracker.assign("0xabc", &callback).await.unwrap();
        let b = tracker.assign("0xabc", &callback).await.unwrap();
        let c = tracker.assign("0xabc", &callback).await.unwrap();
        assert_eq!((a, b, c), (5, 6, 7));
    }

    #[tokio::test]
    async fn fast_forward_advances_past_confirmed_nonce() {
        let tracker = NonceTracker::new();
        let callback = FixedNonce(0);
        tracker.assign("0xabc", &callback).await.unwrap();
        tracker.fast_forward("0xabc", 10).await;
        let next = tracker.assign("0xabc", &callback).await.unwrap();
        assert_eq!(next, 11);
    }

    #[tokio::test]
    async fn fast_forward_is_noop_when_behind_local_counter() {
        let tracker = NonceTracker::new();
        let callback = FixedNonce(20);
        tracker.assign("0xabc", &callback).await.unwrap();
        tracker.fast_forward("0xabc", 0).await;
        let next = tracker.assign("0xabc", &callback).await.unwrap();
        assert_eq!(next, 21);
    }
}
