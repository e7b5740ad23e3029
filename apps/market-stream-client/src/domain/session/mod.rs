//! Session Status Types
//!
//! Connection status, authentication status and the credentials that
//! identify a streaming session.
//!
//! # Status Model
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──opened──► Connected ──confirm──► LoggedIn
//!      ▲                                                 │
//!      └──────────────────────closed─────────────────────┘
//! ```
//!
//! `Error` is a transient connection status: the transport reports it and a
//! close event usually follows, returning the session to `Disconnected`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Connection Status
// =============================================================================

/// Transport connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No transport is open.
    #[default]
    Disconnected,
    /// `connect()` was issued and the transport has not opened yet.
    Connecting,
    /// The transport is open.
    Connected,
    /// The transport reported an error.
    Error,
}

impl ConnectionStatus {
    /// Whether a new `connect()` may start from this status.
    #[must_use]
    pub const fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Whether the transport is open and able to carry requests.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Get the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Authentication Status
// =============================================================================

/// Authentication status of the session.
///
/// Only an inbound confirmation frame moves this to `LoggedIn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthStatus {
    /// Not authenticated.
    #[default]
    LoggedOut,
    /// Server confirmed the login.
    LoggedIn,
}

impl AuthStatus {
    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn)
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => f.write_str("loggedOut"),
            Self::LoggedIn => f.write_str("loggedIn"),
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Errors raised when building credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    /// A required field was empty.
    #[error("credential field `{0}` cannot be empty")]
    EmptyField(&'static str),
}

/// Session-identifying fields sent on every request.
///
/// The values are opaque to the client and replayed verbatim. The `Debug`
/// implementation redacts the session and device identifiers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    gscid: String,
    gcid: String,
    session_id: String,
    device_id: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if `gscid` or `gcid` is empty.
    pub fn new(
        gscid: impl Into<String>,
        gcid: impl Into<String>,
        session_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let credentials = Self {
            gscid: gscid.into().trim().to_string(),
            gcid: gcid.into().trim().to_string(),
            session_id: session_id.into().trim().to_string(),
            device_id: device_id.into().trim().to_string(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first empty required field.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.gscid.is_empty() {
            return Err(CredentialsError::EmptyField("gscid"));
        }
        if self.gcid.is_empty() {
            return Err(CredentialsError::EmptyField("gcid"));
        }
        Ok(())
    }

    /// Get the `gscid` value.
    #[must_use]
    pub fn gscid(&self) -> &str {
        &self.gscid
    }

    /// Get the `gcid` value.
    #[must_use]
    pub fn gcid(&self) -> &str {
        &self.gcid
    }

    /// Get the session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("gscid", &self.gscid)
            .field("gcid", &self.gcid)
            .field("session_id", &"[REDACTED]")
            .field("device_id", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Stream Kind
// =============================================================================

/// Granularity of a market data subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StreamKind {
    /// Light ticker: last traded price and change.
    #[serde(rename = "ltpinfo")]
    LtpInfo,
    /// Full market picture with depth.
    #[serde(rename = "marketPicture")]
    MarketPicture,
}

impl StreamKind {
    /// Get all stream kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::LtpInfo, Self::MarketPicture]
    }

    /// Get the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LtpInfo => "ltpinfo",
            Self::MarketPicture => "marketPicture",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ltpinfo" | "ltp" => Ok(Self::LtpInfo),
            "marketpicture" | "market_picture" | "depth" => Ok(Self::MarketPicture),
            other => Err(format!("unknown stream kind: {other}")),
        }
    }
}
