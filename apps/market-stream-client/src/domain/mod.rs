//! Domain Layer - Core session, subscription and market data types.
//!
//! This layer contains the core domain types for the streaming session
//! with no I/O. All types here are pure Rust with serialization support.

/// Inbound market data normalization and the per-symbol store.
pub mod market_data;

/// Operator-facing notification entries.
pub mod notification;

/// Wire envelope and inbound frame interpretation.
pub mod protocol;

/// Connection/authentication status and session credentials.
pub mod session;

/// Subscription keys and the de-duplicating registry.
pub mod subscription;
