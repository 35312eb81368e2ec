//! Routes work to the per-contract `Orchestrator`, creating one lazily the
//! first time a contract address is seen. Mirrors the teacher's top-level
//! `WriterManager`-of-writers shape, generalised from a fixed writer set to
//! an open set of contracts discovered at runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::domain::DomainManager;
use crate::ptx::PublicTxManager;
use crate::stage::{StageEvent, StageServices};
use crate::state::StateStore;
use crate::transport::PeerSender;

use super::orchestrator::Orchestrator;

pub struct Engine {
    orchestrators: DashMap<String, Arc<Orchestrator>>,
    orchestrator_config: OrchestratorConfig,
    state_store: Arc<StateStore>,
    domain_manager: Arc<DomainManager>,
    ptx_manager: Arc<PublicTxManager>,
    peer: Arc<dyn PeerSender>,
    shutdown: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(
        orchestrator_config: OrchestratorConfig,
        state_store: Arc<StateStore>,
        domain_manager: Arc<DomainManager>,
        ptx_manager: Arc<PublicTxManager>,
        peer: Arc<dyn PeerSender>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            orchestrators: DashMap::new(),
            orchestrator_config,
            state_store,
            domain_manager,
            ptx_manager,
            peer,
            shutdown,
        })
    }

    /// Returns the orchestrator for `contract`, spawning a fresh one (and
    /// its background evaluation loop) if this is the first time the
    /// contract has been seen.
    fn orchestrator_for(self: &Arc<Self>, contract: &str) -> Arc<Orchestrator> {
        let key = contract.to_lowercase();
        if let Some(existing) = self.orchestrators.get(&key) {
            return existing.clone();
        }

        let address = paladin_types::EvmAddress::from_hex(&key)
            .unwrap_or_else(|_| paladin_types::EvmAddress::from_hex("0x0000000000000000000000000000000000000000").unwrap());
        let services = StageServices::new(
            self.state_store.clone(),
            self.domain_manager.clone(),
            self.ptx_manager.clone(),
            self.peer.clone(),
        );
        let orchestrator = Arc::new(Orchestrator::new(address, &self.orchestrator_config, services));

        tokio::spawn({
            let orchestrator = orchestrator.clone();
            let shutdown = self.shutdown.clone();
            async move {
                orchestrator.run(shutdown).await;
            }
        });

        self.orchestrators.insert(key, orchestrator.clone());
        orchestrator
    }

    /// Admits a newly observed private transaction into its contract's
    /// orchestrator.
    pub fn submit_transaction(self: &Arc<Self>, contract: &str, tx_id: Uuid, initial_data: Value) {
        let orchestrator = self.orchestrator_for(contract);
        tokio::spawn(async move {
            orchestrator.submit(tx_id, initial_data).await;
        });
    }

    /// Delivers an out-of-band stage event (an endorsement response, a
    /// delegation ack) to the right contract's orchestrator.
    pub fn deliver(self: &Arc<Self>, contract: &str, event: StageEvent) {
        self.orchestrator_for(contract).deliver(event);
    }

    pub fn orchestrator_count(&self) -> usize {
        self.orchestrators.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.orchestrators.iter().map(|entry| entry.in_flight_count()).sum()
    }

    /// Periodically tallies every orchestrator's state and republishes the
    /// `orchestrators_active` gauge per state, since each orchestrator only
    /// knows its own state.
    pub async fn run_metrics_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => return,
            }

            let mut counts: HashMap<&'static str, i64> = HashMap::new();
            for entry in self.orchestrators.iter() {
                let state = entry.state().await;
                *counts.entry(state.as_str()).or_insert(0) += 1;
            }
            for state in ["new", "running", "waiting", "stale", "idle", "stopped"] {
                crate::metrics::set_orchestrators_active(state, *counts.get(state).unwrap_or(&0));
            }
        }
    }
}

/// Cheaply cloneable handle to the engine, passed into the API server and
/// any other task that needs read access without owning the engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Engine>,
}

impl EngineHandle {
    pub fn new(inner: Arc<Engine>) -> Self {
        Self { inner }
    }

    pub fn submit_transaction(&self, contract: &str, tx_id: Uuid, initial_data: Value) {
        self.inner.submit_transaction(contract, tx_id, initial_data);
    }

    pub fn deliver(&self, contract: &str, event: StageEvent) {
        self.inner.deliver(contract, event);
    }

    pub async fn orchestrator_count(&self) -> usize {
        self.inner.orchestrator_count()
    }

    pub async fn in_flight_count(&self) -> usize {
        self.inner.in_flight_count()
    }
}
