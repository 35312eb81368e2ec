//! Per-contract orchestrator (spec section 4.6): fairness and admission
//! for one contract address. One background worker runs the evaluation
//! loop (spec section 5, "Scheduling model").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use paladin_types::EvmAddress;

use crate::stage::{StageController, StageEvent, StageServices};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    New,
    Running,
    Waiting,
    Stale,
    Idle,
    Stopped,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::New => "new",
            OrchestratorState::Running => "running",
            OrchestratorState::Waiting => "waiting",
            OrchestratorState::Stale => "stale",
            OrchestratorState::Idle => "idle",
            OrchestratorState::Stopped => "stopped",
        }
    }
}

/// Scheduler for one contract address. Holds the stage controller driving
/// in-flight transaction processors and a queue of admitted-but-not-yet
/// in-flight transaction ids when above `max_concurrent_process`.
pub struct Orchestrator {
    pub contract: EvmAddress,
    max_concurrent_process: usize,
    eval_interval: Duration,
    stale_timeout: Duration,
    controller: Arc<StageController>,
    queued: Mutex<VecDeque<(Uuid, serde_json::Value)>>,
    state: Mutex<OrchestratorState>,
    last_progress: Mutex<Instant>,
    evaluate_now: watch::Sender<u64>,
    evaluate_now_rx: watch::Receiver<u64>,
    tick_counter: AtomicU64,
}

impl Orchestrator {
    pub fn new(contract: EvmAddress, config: &crate::config::OrchestratorConfig, services: StageServices) -> Self {
        let (evaluate_now, evaluate_now_rx) = watch::channel(0);
        Self {
            contract,
            controller: Arc::new(StageController::new(services, config.stage_retry)),
            max_concurrent_process: config.max_concurrent_process,
            eval_interval: Duration::from_secs(config.eval_interval_secs),
            stale_timeout: Duration::from_secs(config.stale_timeout_secs),
            queued: Mutex::new(VecDeque::new()),
            state: Mutex::new(OrchestratorState::New),
            last_progress: Mutex::new(Instant::now()),
            evaluate_now,
            evaluate_now_rx,
            tick_counter: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> OrchestratorState {
        *self.state.lock().await
    }

    pub fn in_flight_count(&self) -> usize {
        self.controller.in_flight_count()
    }

    /// Submits a new transaction for admission; admitted immediately if
    /// under `max_concurrent_process`, otherwise queued for the next
    /// evaluation tick.
    pub async fn submit(&self, tx_id: Uuid, initial_data: serde_json::Value) {
        if self.controller.in_flight_count() < self.max_concurrent_process {
            self.admit(tx_id, initial_data).await;
        } else {
            self.queued.lock().await.push_back((tx_id, initial_data));
        }
    }

    async fn admit(&self, tx_id: Uuid, initial_data: serde_json::Value) {
        self.controller.admit(tx_id, self.contract.as_hex());
        self.controller.deliver(StageEvent {
            contract_address: self.contract.as_hex(),
            tx_id,
            stage: crate::stage::StageName::Assemble,
            data: initial_data,
        });
        *self.last_progress.lock().await = Instant::now();
    }

    pub fn deliver(&self, event: StageEvent) {
        self.controller.deliver(event);
    }

    /// Requests an out-of-band evaluation (`TriggerOrchestratorEvaluation`).
    /// Coalesced: multiple triggers before the loop wakes collapse into one.
    pub fn trigger_evaluation(&self) {
        let _ = self.evaluate_now.send(self.tick_counter.fetch_add(1, Ordering::Relaxed));
    }

    /// The orchestrator's background worker: pulls queued transactions in
    /// on every `evalInterval` tick (or on demand), and recomputes state
    /// per spec section 4.6.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.eval_interval);
        let mut evaluate_rx = self.evaluate_now_rx.clone();
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = evaluate_rx.changed() => {}
                _ = shutdown.changed() => {
                    *self.state.lock().await = OrchestratorState::Stopped;
                    return;
                }
            }
            self.evaluate().await;
        }
    }

    async fn evaluate(&self) {
        let mut admitted_any = false;
        {
            let mut queued = self.queued.lock().await;
            while self.controller.in_flight_count() < self.max_concurrent_process {
                let Some((tx_id, data)) = queued.pop_front() else { break };
                drop(queued);
                self.admit(tx_id, data).await;
                admitted_any = true;
                queued = self.queued.lock().await;
            }
        }

        let in_flight = self.controller.in_flight_count();
        let queued_len = self.queued.lock().await.len();
        let stale_for = self.last_progress.lock().await.elapsed();

        let mut state = self.state.lock().await;
        *state = if in_flight == 0 && queued_len == 0 {
            OrchestratorState::Idle
        } else if admitted_any {
            OrchestratorState::Running
        } else if queued_len > 0 && in_flight >= self.max_concurrent_process {
            OrchestratorState::Waiting
        } else if stale_for >= self.stale_timeout {
            OrchestratorState::Stale
        } else {
            OrchestratorState::Running
        };
    }
}
