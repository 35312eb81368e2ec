//! Per-transaction cooperative event loop (spec section 4.4, "Event loop
//! per transaction"). One `TransactionProcessor` per in-flight
//! transaction, driven off its own unbounded channel, so no caller-facing
//! method ever blocks on another transaction (spec section 5).

use std::collections::VecDeque;
use std::time::Instant;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::stage::decision::StageDecision;
use crate::stage::event::{StageEvent, StageName};
use crate::stage::services::StageServices;
use crate::stage::stages::StageProcessorRegistry;

/// Buffered-event cap per transaction; events beyond this for a future
/// stage are dropped with a warning rather than grown unbounded.
const PENDING_RING_CAPACITY: usize = 64;

pub struct StageContext {
    pub stage: StageName,
    pub started_at: Instant,
    pub data: serde_json::Value,
    pub pending_events: VecDeque<StageEvent>,
}

impl StageContext {
    pub fn new(stage: StageName) -> Self {
        Self { stage, started_at: Instant::now(), data: serde_json::Value::Null, pending_events: VecDeque::new() }
    }
}

pub enum ProcessorOutcome {
    Completed,
    Failed(String),
    Removed,
}

pub struct TransactionProcessor {
    pub tx_id: Uuid,
    pub contract_address: String,
    events: mpsc::UnboundedReceiver<StageEvent>,
    context: StageContext,
    services: StageServices,
    registry: StageProcessorRegistry,
    stage_retry_cap: u32,
    retries_in_stage: u32,
}

impl TransactionProcessor {
    pub fn new(
        tx_id: Uuid,
        contract_address: String,
        events: mpsc::UnboundedReceiver<StageEvent>,
        services: StageServices,
        stage_retry_cap: u32,
    ) -> Self {
        Self {
            tx_id,
            contract_address,
            events,
            context: StageContext::new(StageName::Assemble),
            services,
            registry: StageProcessorRegistry::default(),
            stage_retry_cap,
            retries_in_stage: 0,
        }
    }

    /// Drains events until the transaction reaches a terminal outcome or
    /// the channel closes (processor cancellation, spec section 5). A
    /// periodic tick also drives `advance` so stage timeouts (e.g.
    /// Attestation's endorsement collection) fire without requiring a
    /// fresh event.
    pub async fn run(&mut self) -> ProcessorOutcome {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                maybe_event = self.events.recv() => {
                    let Some(event) = maybe_event else {
                        return ProcessorOutcome::Removed;
                    };
                    if self.handle(event) {
                        if let Some(outcome) = self.advance().await {
                            return outcome;
                        }
                    }
                }
                _ = tick.tick() => {
                    if let Some(outcome) = self.advance().await {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Returns true if the event matched the current stage and should
    /// trigger an immediate `advance`.
    fn handle(&mut self, event: StageEvent) -> bool {
        if event.stage < self.context.stage {
            tracing::warn!(tx_id = %self.tx_id, stage = event.stage.as_str(), "discarding event for earlier stage");
            return false;
        }
        if event.stage > self.context.stage {
            if self.context.pending_events.len() >= PENDING_RING_CAPACITY {
                tracing::warn!(tx_id = %self.tx_id, "pending event ring full, dropping oldest");
                self.context.pending_events.pop_front();
            }
            self.context.pending_events.push_back(event);
            return false;
        }

        self.context.data = event.data.clone();
        true
    }

    /// Invokes the current stage's processor synchronously with whatever
    /// events have accumulated; call after `handle` observes the current
    /// stage matched. Exposed separately so tests can drive it directly
    /// without going through the channel.
    pub async fn advance(&mut self) -> Option<ProcessorOutcome> {
        let processor = self.registry.get(self.context.stage);
        let decision = processor.process_events(&self.services, self.tx_id, &self.context).await;

        crate::metrics::record_stage_transition(self.context.stage.as_str(), decision_label(&decision));
        crate::metrics::record_stage_latency(
            self.context.stage.as_str(),
            self.context.started_at.elapsed().as_secs_f64(),
        );

        match decision {
            StageDecision::StayInStage => None,
            StageDecision::AdvanceTo(next, data) => {
                self.context = StageContext::new(next);
                self.context.data = data;
                self.retries_in_stage = 0;
                self.replay_pending();
                None
            }
            StageDecision::Retry(_delay) => {
                self.retries_in_stage += 1;
                if self.retries_in_stage > self.stage_retry_cap {
                    Some(ProcessorOutcome::Failed("stage retry cap exceeded".to_string()))
                } else {
                    None
                }
            }
            StageDecision::Suspend => None,
            StageDecision::Fail(reason) => Some(ProcessorOutcome::Failed(reason)),
            StageDecision::Remove => Some(ProcessorOutcome::Removed),
        }
    }

    fn replay_pending(&mut self) {
        let ready: Vec<StageEvent> = self
            .context
            .pending_events
            .iter()
            .filter(|e| e.stage == self.context.stage)
            .cloned()
            .collect();
        self.context.pending_events.retain(|e| e.stage != self.context.stage);
        for event in ready {
            self.context.data = event.data;
        }
    }
}

fn decision_label(decision: &StageDecision) -> &'static str {
    match decision {
        StageDecision::StayInStage => "stay",
        StageDecision::AdvanceTo(_, _) => "advance",
        StageDecision::Retry(_) => "retry",
        StageDecision::Suspend => "suspend",
        StageDecision::Fail(_) => "fail",
        StageDecision::Remove => "remove",
    }
}
