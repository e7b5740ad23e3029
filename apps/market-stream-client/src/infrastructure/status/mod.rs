//! Status and Metrics Endpoint
//!
//! HTTP endpoint exposing the session's observable state and Prometheus
//! metrics to dashboards and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Ready when the session is connected and logged in
//! - `GET /status` - JSON snapshot: connection, auth, subscriptions, market data
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::SessionSnapshot;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::runtime::SharedSnapshot;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// =============================================================================
// Response Types
// =============================================================================

/// Status endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Client version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Session state.
    #[serde(flatten)]
    pub session: SessionSnapshot,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the status server.
pub struct StatusServerState {
    version: String,
    started_at: Instant,
    snapshot: SharedSnapshot,
    metrics: Option<PrometheusHandle>,
}

impl StatusServerState {
    /// Create state serving `snapshot` and the globally installed recorder.
    #[must_use]
    pub fn new(version: impl Into<String>, snapshot: SharedSnapshot) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            snapshot,
            metrics: get_metrics_handle(),
        }
    }

    /// Serve metrics from `handle` instead of the global recorder.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for StatusServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusServerState")
            .field("version", &self.version)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Server
// =============================================================================

/// Status HTTP server.
pub struct StatusServer {
    port: u16,
    state: Arc<StatusServerState>,
    cancel: CancellationToken,
}

impl StatusServer {
    /// Create a new status server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<StatusServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the status server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `StatusServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), StatusServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StatusServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Status server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| StatusServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}

/// Build the status router.
pub fn router(state: Arc<StatusServerState>) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    let ready = {
        let snapshot = state.snapshot.read();
        snapshot.connection.is_open() && snapshot.auth.is_logged_in()
    };

    if ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn status_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    let session = state.snapshot.read().clone();
    Json(StatusResponse {
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        session,
    })
}

async fn metrics_handler(State(state): State<Arc<StatusServerState>>) -> Response {
    let Some(handle) = &state.metrics else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response();
    };
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        handle.render(),
    )
        .into_response()
}

// =============================================================================
// Errors
// =============================================================================

/// Status server errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use parking_lot::RwLock;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::session::{AuthStatus, ConnectionStatus};

    fn state_with(snapshot: SessionSnapshot) -> Arc<StatusServerState> {
        Arc::new(StatusServerState::new(
            "test",
            Arc::new(RwLock::new(snapshot)),
        ))
    }

    async fn get_path(state: Arc<StatusServerState>, path: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn liveness_ok() {
        let (status, body) = get_path(state_with(SessionSnapshot::default()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn readiness_requires_login() {
        let (status, _) = get_path(state_with(SessionSnapshot::default()), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let snapshot = SessionSnapshot {
            connection: ConnectionStatus::Connected,
            auth: AuthStatus::LoggedIn,
            ..SessionSnapshot::default()
        };
        let (status, body) = get_path(state_with(snapshot), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "READY");
    }

    #[tokio::test]
    async fn metrics_unavailable_without_recorder() {
        let state = StatusServerState {
            metrics: None,
            ..StatusServerState::new("test", Arc::new(RwLock::new(SessionSnapshot::default())))
        };
        let (status, _) = get_path(Arc::new(state), "/metrics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_rendered_from_handle() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::gauge!("market_stream_subscriptions").set(3.0);
        });
        let state = StatusServerState::new(
            "test",
            Arc::new(RwLock::new(SessionSnapshot::default())),
        )
        .with_metrics(handle);

        let (status, body) = get_path(Arc::new(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("market_stream_subscriptions 3"));
    }

    #[tokio::test]
    async fn status_reports_snapshot() {
        let snapshot = SessionSnapshot {
            connection: ConnectionStatus::Connected,
            ..SessionSnapshot::default()
        };
        let (status, body) = get_path(state_with(snapshot), "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["version"], "test");
        assert_eq!(json["connection"], "connected");
        assert_eq!(json["auth"], "loggedOut");
        assert_eq!(json["subscriptions"], serde_json::json!([]));
    }
}
