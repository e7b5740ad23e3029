//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: A text-frame duplex connection to the venue
//! - `KeyValueStore`: String key/value persistence for session state
//!
//! Both ports are synchronous. Transport adapters report lifecycle changes
//! and inbound frames as [`ConnectionEvent`]s through a channel owned by the
//! runtime, so the session itself never awaits. Every event carries the
//! [`ConnectionId`] returned by the `open` call that started its connection.

use std::fmt;

/// Identifies one connection attempt of a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Get the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle and data events reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and ready to send.
    Opened,
    /// An inbound text frame.
    Message(String),
    /// The connection failed.
    Error(String),
    /// The connection closed, cleanly or not.
    Closed,
}

/// A [`TransportEvent`] tagged with the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// Connection the event belongs to.
    pub connection: ConnectionId,
    /// The event.
    pub event: TransportEvent,
}

impl ConnectionEvent {
    /// Tag `event` with `connection`.
    #[must_use]
    pub const fn new(connection: ConnectionId, event: TransportEvent) -> Self {
        Self { connection, event }
    }
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No open connection to send on.
    #[error("transport is not open")]
    NotOpen,

    /// The connection could not be started.
    #[error("failed to start connection: {0}")]
    ConnectFailed(String),
}

/// Duplex text-frame connection to the venue.
///
/// `open` only starts the connection; completion is reported later as
/// [`TransportEvent::Opened`] or [`TransportEvent::Error`]. Opening again
/// supersedes any previous connection, whose remaining events keep their old
/// id.
pub trait Transport: Send {
    /// Start a new connection and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be started.
    fn open(&mut self) -> Result<ConnectionId, TransportError>;

    /// Queue a text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if there is no open connection.
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. A no-op when nothing is open.
    fn close(&mut self);
}

/// String key/value store.
///
/// Adapters swallow their own I/O failures; a failed read is a missing key.
pub trait KeyValueStore: Send {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&mut self, key: &str, value: &str);

    /// Delete a value.
    fn remove(&mut self, key: &str);
}
