//! Prometheus metrics for machine-status.
//!
//! Covers:
//! - Source connection state
//! - Fetch outcomes and latency
//! - Reconnection attempts
//! - Viewer sessions
//! - Exporter refreshes
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure here means duplicate metric
//! names, which only happens at static initialization.

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, CounterVec, Encoder, GaugeVec, HistogramVec,
    IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Per-source connection state (1 = online).
/// Labels: source
pub static SOURCE_ONLINE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "mstat_source_online",
        "Source connection state (1=online)",
        &["source"]
    )
    .unwrap()
});

/// Fetches by outcome.
/// Labels: source, outcome (ok/offline/failed)
pub static FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mstat_fetch_total",
        "Fetches by source and outcome",
        &["source", "outcome"]
    )
    .unwrap()
});

/// Successful fetch round-trip in milliseconds.
pub static FETCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "mstat_fetch_latency_ms",
        "Trigger-to-reply latency in milliseconds",
        &["source"],
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Connection attempts made by the reconnector.
/// Labels: source, result (ok/error)
pub static RECONNECT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mstat_reconnect_total",
        "Reconnection attempts by source and result",
        &["source", "result"]
    )
    .unwrap()
});

/// Fetch cycles, counted when fully delivered or abandoned.
pub static CYCLES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mstat_cycles_total",
        "Fetch cycles that ended, delivered or abandoned"
    )
    .unwrap()
});

/// Offline sources seen by the most recently ended cycle.
pub static CYCLE_OFFLINE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "mstat_cycle_offline_sources",
        "Sources reported offline in the last completed cycle"
    )
    .unwrap()
});

/// Connected viewer sessions.
pub static VIEWER_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("mstat_viewer_sessions", "Connected viewer sessions").unwrap()
});

/// Exporter command runs.
/// Labels: result (ok/error)
pub static EXPORTER_REFRESH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mstat_exporter_refresh_total",
        "Exporter status command runs by result",
        &["result"]
    )
    .unwrap()
});

/// Status requests answered by the exporter.
pub static EXPORTER_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mstat_exporter_requests_total",
        "Status requests answered by the exporter"
    )
    .unwrap()
});

fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a source going online or offline.
    pub fn source_online(source: &str, online: bool) {
        SOURCE_ONLINE
            .with_label_values(&[source])
            .set(if online { 1.0 } else { 0.0 });
    }

    /// Record one fetch outcome.
    pub fn fetch_completed(source: &str, outcome: &str) {
        FETCH_TOTAL.with_label_values(&[source, outcome]).inc();
    }

    pub fn fetch_latency(source: &str, latency: Duration) {
        FETCH_LATENCY_MS
            .with_label_values(&[source])
            .observe(latency.as_secs_f64() * 1000.0);
    }

    pub fn reconnect_attempt(source: &str, ok: bool) {
        RECONNECT_TOTAL
            .with_label_values(&[source, result_label(ok)])
            .inc();
    }

    /// Record an ended cycle and how many sources it reported offline.
    pub fn cycle_completed(offline: usize) {
        CYCLES_TOTAL.inc();
        CYCLE_OFFLINE.set(offline as i64);
    }

    pub fn viewer_connected() {
        VIEWER_SESSIONS.inc();
    }

    pub fn viewer_disconnected() {
        VIEWER_SESSIONS.dec();
    }

    pub fn exporter_refresh(ok: bool) {
        EXPORTER_REFRESH_TOTAL
            .with_label_values(&[result_label(ok)])
            .inc();
    }

    pub fn exporter_request() {
        EXPORTER_REQUESTS_TOTAL.inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
