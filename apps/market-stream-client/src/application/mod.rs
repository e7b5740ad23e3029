//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the session state machine and the port interfaces
//! that define how the domain interacts with the transport and storage.

/// Port interfaces for external systems (transport, key/value storage).
pub mod ports;

/// Application services for session management and persistence.
pub mod services;
