//! Prometheus metrics for the roomwatch gateway.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which must crash at startup.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, register_int_gauge, CounterVec,
    Encoder, Gauge, IntCounter, IntGauge, TextEncoder,
};

/// Serial connection state (1 = connected, 0 = disconnected).
pub static SERIAL_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "roomwatch_serial_connected",
        "Serial connection state (1=connected)"
    )
    .unwrap()
});

/// Readings aggregated.
pub static READINGS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("roomwatch_readings_total", "Total sensor readings aggregated").unwrap()
});

/// Lines dropped because they could not be decoded.
pub static DECODE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "roomwatch_decode_errors_total",
        "Total inbound lines dropped as malformed"
    )
    .unwrap()
});

/// Commands by outcome.
/// Labels: outcome (accepted/rejected/write_failed)
pub static COMMANDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "roomwatch_commands_total",
        "Total device commands by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Attached WebSocket sessions.
pub static WS_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("roomwatch_ws_sessions", "Currently attached WebSocket sessions").unwrap()
});

/// Messages published to sessions.
/// Labels: kind (device_status/sensor_update/command_failed)
pub static BROADCAST_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "roomwatch_broadcast_total",
        "Total messages broadcast to sessions",
        &["kind"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record serial connected.
    pub fn serial_connected() {
        SERIAL_CONNECTED.set(1.0);
    }

    /// Record serial disconnected.
    pub fn serial_disconnected() {
        SERIAL_CONNECTED.set(0.0);
    }

    /// Record one aggregated reading.
    pub fn reading_received() {
        READINGS_TOTAL.inc();
    }

    /// Record one dropped line.
    pub fn decode_error() {
        DECODE_ERRORS_TOTAL.inc();
    }

    /// Record a command outcome.
    pub fn command(outcome: &str) {
        COMMANDS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn ws_session_opened() {
        WS_SESSIONS.inc();
    }

    pub fn ws_session_closed() {
        WS_SESSIONS.dec();
    }

    /// Record a broadcast message.
    pub fn broadcast(kind: &str) {
        BROADCAST_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Render the default registry in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        // Touch the statics so every metric appears even before first use.
        Lazy::force(&SERIAL_CONNECTED);
        Lazy::force(&READINGS_TOTAL);
        Lazy::force(&DECODE_ERRORS_TOTAL);
        Lazy::force(&COMMANDS_TOTAL);
        Lazy::force(&WS_SESSIONS);
        Lazy::force(&BROADCAST_TOTAL);

        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_metrics() {
        Metrics::reading_received();
        Metrics::command("accepted");
        let text = Metrics::render().unwrap();
        assert!(text.contains("roomwatch_readings_total"));
        assert!(text.contains("roomwatch_commands_total{outcome=\"accepted\"}"));
        assert!(text.contains("roomwatch_serial_connected"));
    }
}
