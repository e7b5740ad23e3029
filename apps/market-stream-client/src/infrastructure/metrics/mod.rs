//! Prometheus Metrics Module
//!
//! Exposes session metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Counts of frames sent, received and rejected by the codec
//! - **Session**: Connection and authentication status, login confirmations
//! - **Subscriptions**: Active subscription and market record counts
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the status server port. Values are
//! published from session snapshots by the runtime after every input.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::services::SessionSnapshot;
use crate::domain::session::ConnectionStatus;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_stream_frames_sent_total",
        "Total frames sent to the venue"
    );
    describe_counter!(
        "market_stream_frames_received_total",
        "Total frames received from the venue"
    );
    describe_counter!(
        "market_stream_decode_failures_total",
        "Total inbound frames that were not valid JSON"
    );
    describe_counter!(
        "market_stream_logins_confirmed_total",
        "Total login confirmations received"
    );
    describe_counter!(
        "market_stream_subscriptions_replayed_total",
        "Total subscribe requests sent by replay after login"
    );

    describe_gauge!(
        "market_stream_connection_status",
        "Connection status (0 disconnected, 1 connecting, 2 connected, 3 error)"
    );
    describe_gauge!(
        "market_stream_logged_in",
        "Whether the session is authenticated (1) or not (0)"
    );
    describe_gauge!(
        "market_stream_subscriptions",
        "Number of registered subscriptions"
    );
    describe_gauge!(
        "market_stream_market_records",
        "Number of symbols with a market record"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Numeric encoding of a connection status for the status gauge.
#[must_use]
pub const fn connection_code(status: ConnectionStatus) -> f64 {
    match status {
        ConnectionStatus::Disconnected => 0.0,
        ConnectionStatus::Connecting => 1.0,
        ConnectionStatus::Connected => 2.0,
        ConnectionStatus::Error => 3.0,
    }
}

/// Publish the counters and gauges carried by a snapshot.
#[allow(clippy::cast_precision_loss)]
pub fn record_snapshot(snapshot: &SessionSnapshot) {
    let stats = &snapshot.stats;
    counter!("market_stream_frames_sent_total").absolute(stats.frames_sent);
    counter!("market_stream_frames_received_total").absolute(stats.frames_received);
    counter!("market_stream_decode_failures_total").absolute(stats.decode_failures);
    counter!("market_stream_logins_confirmed_total").absolute(stats.logins_confirmed);
    counter!("market_stream_subscriptions_replayed_total").absolute(stats.subscriptions_replayed);

    gauge!("market_stream_connection_status").set(connection_code(snapshot.connection));
    gauge!("market_stream_logged_in").set(if snapshot.auth.is_logged_in() { 1.0 } else { 0.0 });
    gauge!("market_stream_subscriptions").set(snapshot.subscriptions.len() as f64);
    gauge!("market_stream_market_records").set(snapshot.market_data.len() as f64);
}

// =============================================================================
// Tests
// =============================================================================
