//! Prometheus Metrics Module
//!
//! Provides client-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Inbound events by wire name, and unknown events dropped
//! - Outbound commands by name and outcome
//! - Current connection state
//! - Reconnection attempts

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::ConnectionState;

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Inbound events routed, by wire name
pub static INBOUND_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("inbound_events_total", "Total number of inbound events routed")
            .namespace("realtime"),
        &["event"],
    )
    .expect("Failed to create INBOUND_EVENTS_TOTAL metric")
});

/// Inbound events dropped because the name is not in the routing table
pub static UNKNOWN_EVENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("unknown_events_total", "Inbound events with an unknown name")
            .namespace("realtime"),
    )
    .expect("Failed to create UNKNOWN_EVENTS_TOTAL metric")
});

/// Outbound commands by name and outcome
pub static OUTBOUND_COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("outbound_commands_total", "Total number of outbound commands")
            .namespace("realtime"),
        &["command", "outcome"], // "sent", "not_connected", "rejected"
    )
    .expect("Failed to create OUTBOUND_COMMANDS_TOTAL metric")
});

/// Connection state gauge (0 disconnected, 1 connecting, 2 connected)
pub static CONNECTION_STATE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("connection_state", "Transport session connection state").namespace("realtime"),
    )
    .expect("Failed to create CONNECTION_STATE metric")
});

/// Reconnection attempts scheduled by the supervisor
pub static RECONNECT_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("reconnect_attempts_total", "Reconnection attempts scheduled")
            .namespace("realtime"),
    )
    .expect("Failed to create RECONNECT_ATTEMPTS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(INBOUND_EVENTS_TOTAL.clone()))
        .expect("Failed to register INBOUND_EVENTS_TOTAL");
    registry
        .register(Box::new(UNKNOWN_EVENTS_TOTAL.clone()))
        .expect("Failed to register UNKNOWN_EVENTS_TOTAL");
    registry
        .register(Box::new(OUTBOUND_COMMANDS_TOTAL.clone()))
        .expect("Failed to register OUTBOUND_COMMANDS_TOTAL");
    registry
        .register(Box::new(CONNECTION_STATE.clone()))
        .expect("Failed to register CONNECTION_STATE");
    registry
        .register(Box::new(RECONNECT_ATTEMPTS_TOTAL.clone()))
        .expect("Failed to register RECONNECT_ATTEMPTS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record a routed inbound event
pub fn record_inbound_event(event: &str) {
    Lazy::force(&REGISTRY);
    INBOUND_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Helper to record an inbound event with an unknown name
pub fn record_unknown_event() {
    Lazy::force(&REGISTRY);
    UNKNOWN_EVENTS_TOTAL.inc();
}

/// Helper to record an outbound command outcome
pub fn record_outbound_command(command: &str, outcome: &str) {
    Lazy::force(&REGISTRY);
    OUTBOUND_COMMANDS_TOTAL
        .with_label_values(&[command, outcome])
        .inc();
}

/// Helper to update the connection state gauge
pub fn set_connection_state(state: ConnectionState) {
    Lazy::force(&REGISTRY);
    CONNECTION_STATE.set(state.as_gauge());
}

/// Helper to count a scheduled reconnection attempt
pub fn record_reconnect_attempt() {
    Lazy::force(&REGISTRY);
    RECONNECT_ATTEMPTS_TOTAL.inc();
}
