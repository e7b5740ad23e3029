//! Stream Codec Module
//!
//! Encodes outbound requests and interprets inbound frames.
//!
//! # Inbound Detection
//!
//! - **Login confirmation**: `response.svcName == "Broadcast"` and
//!   `response.streamingType == "login"`. No other field is inspected.
//! - **Market data**: either a nested `response.data` object carrying a
//!   `symbol`, or a flat top-level object carrying a `symbol`. The nested
//!   shape is tried first.
//!
//! A frame can be both a login confirmation and a data frame; callers act on
//! each independently.

use serde_json::Value;

use super::messages::{
    BROADCAST_SERVICE, Request, RequestData, RequestEnvelope, RequestType, SessionPayload,
    StreamingType, SymbolsPayload,
};
use crate::domain::market_data::RawFields;
use crate::domain::session::{Credentials, StreamKind};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame was empty or whitespace.
    #[error("empty frame")]
    EmptyFrame,
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// Market data carried by an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFrame {
    /// Symbol the data belongs to.
    pub symbol: String,
    /// Raw fields of the data object, including `symbol`.
    pub fields: RawFields,
}

/// Interpreted inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// The parsed JSON value.
    pub raw: Value,
    /// Whether the frame confirms a login.
    pub login_confirmed: bool,
    /// Market data, if the frame carries an identifiable symbol.
    pub market_data: Option<MarketFrame>,
}

/// Check whether a frame is the venue's login confirmation.
#[must_use]
pub fn is_login_confirmation(value: &Value) -> bool {
    let Some(response) = value.get("response") else {
        return false;
    };

    response.get("svcName").and_then(Value::as_str) == Some(BROADCAST_SERVICE)
        && response.get("streamingType").and_then(Value::as_str)
            == Some(StreamingType::Login.as_str())
}

/// Extract market data from either accepted frame shape.
#[must_use]
pub fn extract_market_data(value: &Value) -> Option<MarketFrame> {
    let nested = value
        .get("response")
        .and_then(|response| response.get("data"))
        .and_then(Value::as_object);

    nested
        .and_then(market_frame)
        .or_else(|| value.as_object().and_then(market_frame))
}

fn market_frame(object: &RawFields) -> Option<MarketFrame> {
    let symbol = object.get("symbol")?.as_str()?.trim();
    if symbol.is_empty() {
        return None;
    }

    Some(MarketFrame {
        symbol: symbol.to_string(),
        fields: object.clone(),
    })
}

// =============================================================================
// Codec
// =============================================================================

/// Static request options supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolOptions {
    /// Value of `response_format` on login/logout.
    pub response_format: String,
    /// Value of `device_type` on login/logout.
    pub device_type: String,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            response_format: "json".to_string(),
            device_type: "WEB".to_string(),
        }
    }
}

/// JSON codec for the streaming protocol.
#[derive(Debug, Default, Clone)]
pub struct ProtocolCodec {
    options: ProtocolOptions,
}

impl ProtocolCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new(options: ProtocolOptions) -> Self {
        Self { options }
    }

    /// Get the configured options.
    #[must_use]
    pub const fn options(&self) -> &ProtocolOptions {
        &self.options
    }

    /// Build the login envelope.
    #[must_use]
    pub fn login(&self, credentials: &Credentials) -> RequestEnvelope {
        self.session_request(RequestType::Subscribe, StreamingType::Login, credentials)
    }

    /// Build the logout envelope.
    #[must_use]
    pub fn logout(&self, credentials: &Credentials) -> RequestEnvelope {
        self.session_request(RequestType::Unsubscribe, StreamingType::Logout, credentials)
    }

    /// Build a subscribe envelope for one token.
    #[must_use]
    pub fn subscribe(
        &self,
        credentials: &Credentials,
        token: &str,
        kind: StreamKind,
    ) -> RequestEnvelope {
        Self::symbol_request(RequestType::Subscribe, kind, credentials, token)
    }

    /// Build an unsubscribe envelope for one token.
    #[must_use]
    pub fn unsubscribe(
        &self,
        credentials: &Credentials,
        token: &str,
        kind: StreamKind,
    ) -> RequestEnvelope {
        Self::symbol_request(RequestType::Unsubscribe, kind, credentials, token)
    }

    /// Encode an envelope to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, envelope: &RequestEnvelope) -> Result<String, CodecError> {
        Ok(serde_json::to_string(envelope)?)
    }

    /// Decode an inbound text frame.
    ///
    /// Any valid JSON decodes; frames that are neither a login confirmation
    /// nor market data come back with both flags unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is empty or not valid JSON.
    pub fn decode(&self, text: &str) -> Result<InboundFrame, CodecError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CodecError::EmptyFrame);
        }

        let raw: Value = serde_json::from_str(trimmed)?;

        Ok(InboundFrame {
            login_confirmed: is_login_confirmation(&raw),
            market_data: extract_market_data(&raw),
            raw,
        })
    }

    fn session_request(
        &self,
        request_type: RequestType,
        streaming_type: StreamingType,
        credentials: &Credentials,
    ) -> RequestEnvelope {
        RequestEnvelope {
            request: Request {
                request_type,
                streaming_type,
                data: RequestData::Session(SessionPayload {
                    gscid: credentials.gscid().to_string(),
                    gcid: credentials.gcid().to_string(),
                    session_id: credentials.session_id().to_string(),
                    device_id: credentials.device_id().to_string(),
                    device_type: self.options.device_type.clone(),
                }),
                gscid: credentials.gscid().to_string(),
                gcid: credentials.gcid().to_string(),
                response_format: Some(self.options.response_format.clone()),
                session_id: Some(credentials.session_id().to_string()),
                device_id: Some(credentials.device_id().to_string()),
                device_type: Some(self.options.device_type.clone()),
            },
        }
    }

    fn symbol_request(
        request_type: RequestType,
        kind: StreamKind,
        credentials: &Credentials,
        token: &str,
    ) -> RequestEnvelope {
        RequestEnvelope {
            request: Request {
                request_type,
                streaming_type: kind.into(),
                data: RequestData::Symbols(SymbolsPayload::single(token)),
                gscid: credentials.gscid().to_string(),
                gcid: credentials.gcid().to_string(),
                response_format: None,
                session_id: Some(credentials.session_id().to_string()),
                device_id: Some(credentials.device_id().to_string()),
                device_type: None,
            },
        }
    }
}
