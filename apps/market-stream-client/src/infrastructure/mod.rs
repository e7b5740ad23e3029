//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, and the runtime that hosts the session.

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Key/value store adapters (memory, JSON file).
pub mod persistence;

/// Event loop hosting the session.
pub mod runtime;

/// Status, readiness and metrics HTTP endpoint.
pub mod status;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// WebSocket transport adapter.
pub mod websocket;
