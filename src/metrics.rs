//! Prometheus metrics for the sync loop
//!
//! Background failures are never surfaced to a caller, so these counters are
//! how an operator sees them.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};

lazy_static! {
    /// Counter: ticks by status (completed / aborted)
    pub static ref TICKS: CounterVec = register_counter_vec!(
        "rosterwatch_ticks_total",
        "Total sync ticks by status",
        &["status"]
    )
    .expect("Failed to create ticks metric");

    /// Counter: per-target outcomes by kind
    pub static ref TARGET_OUTCOMES: CounterVec = register_counter_vec!(
        "rosterwatch_target_outcomes_total",
        "Per-target reconciliation outcomes",
        &["outcome"]
    )
    .expect("Failed to create target_outcomes metric");

    /// Histogram: roster fetch duration (seconds)
    pub static ref FETCH_DURATION: Histogram = register_histogram!(
        "rosterwatch_fetch_duration_seconds",
        "Duration of roster fetches",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create fetch_duration metric");

    /// Gauge: targets seen by the last tick
    pub static ref TARGETS: Gauge = register_gauge!(
        "rosterwatch_targets",
        "Number of display targets in the last tick"
    )
    .expect("Failed to create targets metric");

    /// Gauge: 1 when the last tick completed, 0 when it aborted
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "rosterwatch_health_status",
        "Sync health (1 = last tick completed, 0 = aborted)"
    )
    .expect("Failed to create health_status metric");
}

pub fn record_tick(status: &str) {
    TICKS.with_label_values(&[status]).inc();
}

pub fn record_target_outcome(kind: &str) {
    TARGET_OUTCOMES.with_label_values(&[kind]).inc();
}

pub fn record_fetch_duration(duration_secs: f64) {
    FETCH_DURATION.observe(duration_secs);
}

pub fn set_targets(count: usize) {
    TARGETS.set(count as f64);
}

pub fn set_health_status(healthy: bool) {
    HEALTH_STATUS.set(if healthy { 1.0 } else { 0.0 });
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::RosterError::Other(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::RosterError::Other(format!("metrics are not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exported() {
        record_tick("completed");
        record_target_outcome("live");
        record_fetch_duration(0.2);
        set_targets(3);
        set_health_status(true);

        let output = encode_metrics().unwrap();
        assert!(output.contains("rosterwatch_ticks_total"));
        assert!(output.contains("rosterwatch_target_outcomes_total"));
        assert!(output.contains("rosterwatch_health_status"));
    }
}
