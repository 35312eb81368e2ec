//! Prometheus metrics for the Paladin engine, exposed on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Gauge, GaugeVec, HistogramVec,
};

lazy_static! {
    pub static ref ORCHESTRATORS_ACTIVE: GaugeVec = register_gauge_vec!(
        "paladin_orchestrators_active",
        "Number of orchestrators currently in each state",
        &["state"]
    )
    .unwrap();

    pub static ref TRANSACTIONS_IN_FLIGHT: GaugeVec = register_gauge_vec!(
        "paladin_transactions_in_flight",
        "In-flight private transactions per contract",
        &["contract"]
    )
    .unwrap();

    pub static ref STAGE_TRANSITIONS: CounterVec = register_counter_vec!(
        "paladin_stage_transitions_total",
        "Stage controller decisions",
        &["stage", "decision"]
    )
    .unwrap();

    pub static ref STAGE_LATENCY: HistogramVec = register_histogram_vec!(
        "paladin_stage_latency_seconds",
        "Time spent in a stage before advancing",
        &["stage"],
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    pub static ref PUBLIC_TX_SUBMITTED: CounterVec = register_counter_vec!(
        "paladin_public_tx_submitted_total",
        "Public transactions submitted to the base ledger",
        &["signer"]
    )
    .unwrap();

    pub static ref PUBLIC_TX_OUTCOME: CounterVec = register_counter_vec!(
        "paladin_public_tx_outcome_total",
        "Terminal public transaction outcomes",
        &["outcome"]
    )
    .unwrap();

    pub static ref STATE_PERSISTED: CounterVec = register_counter_vec!(
        "paladin_states_persisted_total",
        "States persisted into the state store",
        &["domain"]
    )
    .unwrap();

    pub static ref TRANSPORT_DELIVERIES: CounterVec = register_counter_vec!(
        "paladin_transport_deliveries_total",
        "Peer transport message deliveries",
        &["payload_type", "outcome"]
    )
    .unwrap();

    pub static ref UP: Gauge = register_gauge!("paladin_up", "Whether the engine is up").unwrap();
}

pub fn record_stage_transition(stage: &str, decision: &str) {
    STAGE_TRANSITIONS.with_label_values(&[stage, decision]).inc();
}

pub fn record_stage_latency(stage: &str, seconds: f64) {
    STAGE_LATENCY.with_label_values(&[stage]).observe(seconds);
}

pub fn record_public_tx_submitted(signer: &str) {
    PUBLIC_TX_SUBMITTED.with_label_values(&[signer]).inc();
}

pub fn record_public_tx_outcome(outcome: &str) {
    PUBLIC_TX_OUTCOME.with_label_values(&[outcome]).inc();
}

pub fn record_state_persisted(domain: &str) {
    STATE_PERSISTED.with_label_values(&[domain]).inc();
}

pub fn record_transport_delivery(payload_type: &str, outcome: &str) {
    TRANSPORT_DELIVERIES
        .with_label_values(&[payload_type, outcome])
        .inc();
}

pub fn set_orchestrators_active(state: &str, count: i64) {
    ORCHESTRATORS_ACTIVE
        .with_label_values(&[state])
        .set(count as f64);
}
