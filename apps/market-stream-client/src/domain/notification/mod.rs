//! Session notifications.
//!
//! Log entries the session emits for the operator. The log itself is owned
//! by whatever renders it; the session only produces entries in order.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Outbound frame.
    Sent,
    /// Inbound frame, decoded or opaque.
    Received,
    /// Failure reported by the transport or a rejected command.
    Error,
    /// Confirmed state change (opened, logged in).
    Success,
    /// Informational message.
    Info,
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Entry category.
    pub kind: NotificationKind,
    /// Frame text or message.
    pub content: String,
    /// Time the entry was produced.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time.
    #[must_use]
    pub fn new(kind: NotificationKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Outbound frame entry.
    #[must_use]
    pub fn sent(content: impl Into<String>) -> Self {
        Self::new(NotificationKind::Sent, content)
    }

    /// Inbound frame entry.
    #[must_use]
    pub fn received(content: impl Into<String>) -> Self {
        Self::new(NotificationKind::Received, content)
    }

    /// Error entry.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, content)
    }

    /// Success entry.
    #[must_use]
    pub fn success(content: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, content)
    }

    /// Info entry.
    #[must_use]
    pub fn info(content: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, content)
    }
}
