//! Streaming Wire Messages
//!
//! Serialization types for the outbound request envelope.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"request": {
//!     "request_type": "subscribe",
//!     "streamingType": "login",
//!     "data": {"gscid": "KS02", "gcid": "218", "sessionId": "...", "deviceId": "...", "device_type": "WEB"},
//!     "gscid": "KS02",
//!     "gcid": "218",
//!     "response_format": "json",
//!     "sessionId": "...",
//!     "deviceId": "...",
//!     "device_type": "WEB"
//! }}
//! ```
//!
//! Subscribe and unsubscribe carry `{"symbols": [{"symbol": "<token>"}]}`
//! as `data`.

use serde::{Deserialize, Serialize};

use crate::domain::session::StreamKind;

/// Service name the venue uses on its login confirmation frame.
pub const BROADCAST_SERVICE: &str = "Broadcast";

// =============================================================================
// Envelope Discriminators
// =============================================================================

/// Outbound request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// Subscribe (also used for login).
    Subscribe,
    /// Unsubscribe (also used for logout).
    Unsubscribe,
}

/// Value of the `streamingType` field.
///
/// `Login` and `Logout` are protocol-only and never stored as subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamingType {
    /// Authentication handshake.
    #[serde(rename = "login")]
    Login,
    /// Session teardown.
    #[serde(rename = "logout")]
    Logout,
    /// Light ticker stream.
    #[serde(rename = "ltpinfo")]
    LtpInfo,
    /// Full market picture stream.
    #[serde(rename = "marketPicture")]
    MarketPicture,
}

impl StreamingType {
    /// Get the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::LtpInfo => "ltpinfo",
            Self::MarketPicture => "marketPicture",
        }
    }
}

impl From<StreamKind> for StreamingType {
    fn from(kind: StreamKind) -> Self {
        match kind {
            StreamKind::LtpInfo => Self::LtpInfo,
            StreamKind::MarketPicture => Self::MarketPicture,
        }
    }
}

// =============================================================================
// Outbound Messages (Client -> Server)
// =============================================================================

/// Top-level outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEnvelope {
    /// The request body.
    pub request: Request,
}

/// Outbound request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Subscribe or unsubscribe.
    pub request_type: RequestType,

    /// Stream the request applies to.
    #[serde(rename = "streamingType")]
    pub streaming_type: StreamingType,

    /// Request payload.
    pub data: RequestData,

    /// Client group identifier.
    pub gscid: String,

    /// Client identifier.
    pub gcid: String,

    /// Response encoding requested from the venue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,

    /// Session identifier.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Device identifier.
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Device class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// Request payload variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestData {
    /// Login/logout payload.
    Session(SessionPayload),
    /// Subscribe/unsubscribe payload.
    Symbols(SymbolsPayload),
}

/// Credentials-derived payload for login and logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPayload {
    /// Client group identifier.
    pub gscid: String,
    /// Client identifier.
    pub gcid: String,
    /// Session identifier.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Device identifier.
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Device class.
    pub device_type: String,
}

/// Symbol list payload for subscribe and unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolsPayload {
    /// Symbols the request applies to.
    pub symbols: Vec<SymbolEntry>,
}

impl SymbolsPayload {
    /// Payload for a single token.
    #[must_use]
    pub fn single(token: impl Into<String>) -> Self {
        Self {
            symbols: vec![SymbolEntry {
                symbol: token.into(),
            }],
        }
    }
}

/// One entry of a symbol list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    /// Token to (un)subscribe.
    pub symbol: String,
}
