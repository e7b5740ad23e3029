#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Stream Client - Session & Subscription Manager
//!
//! Maintains a single authenticated WebSocket session to a streaming venue,
//! keeps the set of active subscriptions across login cycles and turns the
//! heterogeneous inbound stream into a merged per-symbol market record.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `session`: Connection/auth status, credentials, stream kinds
//!   - `protocol`: Wire envelopes and the JSON codec
//!   - `subscription`: Duplicate-free subscription registry
//!   - `market_data`: Per-symbol record merging with field aliasing
//!   - `notification`: Operator log entries
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport and key/value store interfaces
//!   - `services`: The session state machine and typed persistence
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `websocket`: `tokio-tungstenite` transport
//!   - `persistence`: Memory and JSON-file stores
//!   - `runtime`: Single-task event loop hosting the session
//!   - `status`: Status, readiness and metrics HTTP endpoint
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!  operator ──commands──► SessionRuntime ──► Session ──frames──► WebSocketTransport ──► venue
//!                              ▲                │                        │
//!                              └──── events ────┼────────────────────────┘
//!                                               ▼
//!                            snapshot / notifications / metrics
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core session and market data types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market_data::{MarketDataStore, MarketFields, MarketRecord};
pub use domain::notification::{Notification, NotificationKind};
pub use domain::protocol::{CodecError, ProtocolCodec, ProtocolOptions};
pub use domain::session::{AuthStatus, ConnectionStatus, Credentials, StreamKind};
pub use domain::subscription::{SubscriptionKey, SubscriptionRegistry};

// Application
pub use application::ports::{
    ConnectionEvent, ConnectionId, KeyValueStore, Transport, TransportError, TransportEvent,
};
pub use application::services::{
    Session, SessionError, SessionSettings, SessionSnapshot, SessionStats,
};

// Infrastructure
pub use infrastructure::config::{ClientConfig, ConfigError};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::persistence::{FileStore, MemoryStore};
pub use infrastructure::runtime::{RuntimeError, SessionHandle, SessionRuntime};
pub use infrastructure::status::{StatusServer, StatusServerError, StatusServerState};
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
pub use infrastructure::websocket::WebSocketTransport;
