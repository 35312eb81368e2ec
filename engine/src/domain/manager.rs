//! Per-domain lifecycle: configure each registered plugin against its
//! registry contract, retrying forever with backoff until it succeeds or
//! the domain is torn down (spec section 4.3). Operations other than
//! `configure` refuse with `DomainError::NotInitialized` until that first
//! call has completed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use paladin_types::{EvmAddress, Schema, SchemaField};

use crate::config::DomainConfig;
use crate::domain::contract_cache::ContractCache;
use crate::domain::error::DomainError;
use crate::domain::plugin::{
    AssembleTransactionRequest, AssembledTransaction, DomainPlugin, DomainSchemas,
    InitTransactionRequest, InitTransactionResult, PluginContext, SmartContractInfo,
};
use crate::state::StateStore;

struct DomainState {
    config: DomainConfig,
    plugin: Arc<dyn DomainPlugin>,
    schemas: RwLock<Option<DomainSchemas>>,
    contracts: RwLock<ContractCache<SmartContractInfo>>,
    initialized: watch::Sender<bool>,
}

/// Registry of configured domains, each independently retrying its own
/// `configure` call. Shared across the engine via `Arc`.
pub struct DomainManager {
    domains: HashMap<String, Arc<DomainState>>,
    state_store: Arc<StateStore>,
    chain_id: u64,
}

impl DomainManager {
    pub fn new(
        configs: HashMap<String, DomainConfig>,
        plugins: HashMap<String, Arc<dyn DomainPlugin>>,
        contract_cache_capacity: usize,
        state_store: Arc<StateStore>,
        chain_id: u64,
    ) -> Result<Self, DomainError> {
        let mut domains = HashMap::new();
        for (name, config) in configs {
            let plugin = plugins
                .get(&config.plugin)
                .ok_or_else(|| DomainError::ConfigFailed(format!("unknown plugin: {}", config.plugin)))?
                .clone();
            let (tx, _rx) = watch::channel(false);
            domains.insert(
                name,
                Arc::new(DomainState {
                    config,
                    plugin,
                    schemas: RwLock::new(None),
                    contracts: RwLock::new(ContractCache::new(contract_cache_capacity)),
                    initialized: tx,
                }),
            );
        }
        Ok(Self { domains, state_store, chain_id })
    }

    /// Spawns the configure-forever task for every registered domain.
    /// Returns immediately; domains become usable as each configure call
    /// succeeds.
    pub fn spawn_init_loops(self: &Arc<Self>, shutdown: watch::Receiver<bool>) {
        for name in self.domains.keys().cloned().collect::<Vec<_>>() {
            let manager = self.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = manager.configure_forever(&name) => {}
                    _ = shutdown.changed() => {}
                }
            });
        }
    }

    async fn configure_forever(&self, domain: &str) {
        let Some(state) = self.domains.get(domain) else {
            return;
        };
        let mut attempt: u32 = 0;
        loop {
            match state.plugin.configure(state.config.config.clone(), self.chain_id).await {
                Ok(schemas) => {
                    for raw in &schemas.schemas {
                        if let Ok(fields) = serde_json::from_value::<Vec<SchemaField>>(raw.clone()) {
                            if let Ok(name) = serde_json::from_value::<String>(
                                raw.get("struct_name").cloned().unwrap_or_default(),
                            ) {
                                if let Ok(schema) = Schema::new(name, fields) {
                                    if let Err(e) = self.state_store.ensure_schema(domain, &schema).await {
                                        tracing::warn!(domain, error = %e, "failed to register domain schema");
                                    }
                                }
                            }
                        }
                    }
                    *state.schemas.write().await = Some(schemas);
                    let _ = state.initialized.send(true);
                    tracing::info!(domain, attempt, "domain configured");
                    return;
                }
                Err(e) => {
                    attempt += 1;
                    let backoff = backoff_for_attempt(attempt);
                    tracing::warn!(domain, attempt, error = %e, delay_ms = backoff.as_millis() as u64, "domain configure failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    pub fn is_initialized(&self, domain: &str) -> bool {
        self.domains
            .get(domain)
            .map(|s| *s.initialized.borrow())
            .unwrap_or(false)
    }

    pub async fn wait_initialized(&self, domain: &str) -> Result<(), DomainError> {
        let state = self
            .domains
            .get(domain)
            .ok_or_else(|| DomainError::NotInitialized(domain.to_string()))?;
        let mut rx = state.initialized.subscribe();
        if *rx.borrow() {
            return Ok(());
        }
        let _ = rx.changed().await;
        Ok(())
    }

    fn require_state(&self, domain: &str) -> Result<&Arc<DomainState>, DomainError> {
        let state = self
            .domains
            .get(domain)
            .ok_or_else(|| DomainError::NotInitialized(domain.to_string()))?;
        if !*state.initialized.borrow() {
            return Err(DomainError::NotInitialized(domain.to_string()));
        }
        Ok(state)
    }

    pub async fn get_smart_contract(
        &self,
        domain: &str,
        contract: EvmAddress,
    ) -> Result<SmartContractInfo, DomainError> {
        let state = self.require_state(domain)?;
        if let Some(cached) = state.contracts.read().await.get(&contract) {
            return Ok(cached);
        }
        let ctx = PluginContext::new(domain.to_string(), contract, Uuid::nil(), self.state_store.clone());
        let info = state.plugin.get_smart_contract(&ctx).await?;
        state.contracts.write().await.insert(contract, info.clone());
        Ok(info)
    }

    pub async fn init_transaction(
        &self,
        domain: &str,
        contract: EvmAddress,
        req: InitTransactionRequest,
    ) -> Result<InitTransactionResult, DomainError> {
        let state = self.require_state(domain)?;
        let ctx = PluginContext::new(domain.to_string(), contract, Uuid::nil(), self.state_store.clone());
        state.plugin.init_transaction(&ctx, req).await
    }

    pub async fn assemble_transaction(
        &self,
        domain: &str,
        contract: EvmAddress,
        req: AssembleTransactionRequest,
    ) -> Result<AssembledTransaction, DomainError> {
        let state = self.require_state(domain)?;
        let ctx = PluginContext::new(domain.to_string(), contract, req.transaction_id, self.state_store.clone());
        state.plugin.assemble_transaction(&ctx, req).await
    }

    pub fn allow_signing(&self, domain: &str) -> bool {
        self.domains.get(domain).map(|s| s.config.allow_signing).unwrap_or(false)
    }
}

/// Exponential backoff with jitter, uncapped attempt count but capped
/// delay, matching the retry shape used for transport redelivery.
fn backoff_for_attempt(attempt: u32) -> Duration {
    let base_ms: u64 = 500;
    let max_ms: u64 = 60_000;
    let exp = base_ms.saturating_mul(1u64 << attempt.min(10));
    let capped = exp.min(max_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max() {
        let d = backoff_for_attempt(30);
        assert!(d.as_millis() <= 60_000 + 15_000);
    }

    #[test]
    fn backoff_grows_with_attempts() {
        assert!(backoff_for_attempt(1) < backoff_for_attempt(5));
    }
}
