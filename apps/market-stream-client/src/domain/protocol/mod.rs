//! Streaming Protocol
//!
//! Wire types and the JSON codec for the venue's streaming protocol.
//!
//! - **Outbound**: every request is a `{"request": {...}}` envelope whose
//!   `request_type` is `subscribe` or `unsubscribe`. Login and logout reuse
//!   the same envelope with `streamingType` set to `login` / `logout`.
//! - **Inbound**: frames are free-form JSON objects. The codec recognises a
//!   login confirmation and extracts market data; everything else is passed
//!   through as an opaque frame.

pub mod codec;
pub mod messages;

pub use codec::{CodecError, InboundFrame, MarketFrame, ProtocolCodec, ProtocolOptions};
pub use messages::{
    BROADCAST_SERVICE, Request, RequestData, RequestEnvelope, RequestType, SessionPayload,
    StreamingType, SymbolEntry, SymbolsPayload,
};
