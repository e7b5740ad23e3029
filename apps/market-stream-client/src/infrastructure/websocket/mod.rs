//! WebSocket Transport
//!
//! `Transport` adapter over `tokio-tungstenite`. Each `open()` spawns one
//! connection task that reports lifecycle changes and inbound text frames
//! as [`ConnectionEvent`]s on the channel supplied at construction, tagged
//! with the id `open()` returned. Opening again cancels the previous task;
//! its trailing `Closed` still carries the old id.
//!
//! # Event Order
//!
//! A connection task emits `Opened` once the handshake completes, then any
//! number of `Message`s, then optionally `Error`, and always ends with
//! `Closed`. A failed handshake emits `Error` followed by `Closed`.
//!
//! There is no reconnect logic here; reconnecting is an operator decision.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ConnectionEvent, ConnectionId, Transport, TransportError, TransportEvent,
};

/// WebSocket-backed transport.
#[derive(Debug)]
pub struct WebSocketTransport {
    url: String,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    last_id: ConnectionId,
    connection: Option<Connection>,
}

#[derive(Debug)]
struct Connection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Create a transport for `url` reporting into `events`.
    #[must_use]
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            url: url.into(),
            events,
            last_id: ConnectionId::default(),
            connection: None,
        }
    }

    /// Get the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the id of the current connection, if one was started.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|c| c.id)
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self) -> Result<ConnectionId, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        if let Some(previous) = self.connection.take()
            && !previous.task.is_finished()
        {
            tracing::debug!(connection = %previous.id, "Superseding previous connection");
            previous.cancel.cancel();
        }

        let id = self.last_id.next();
        self.last_id = id;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_connection(
            self.url.clone(),
            Reporter {
                id,
                events: self.events.clone(),
            },
            outbound_rx,
            cancel.clone(),
        ));

        self.connection = Some(Connection {
            id,
            outbound,
            cancel,
            task,
        });
        Ok(id)
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_ref()
            .filter(|c| !c.cancel.is_cancelled())
            .ok_or(TransportError::NotOpen)?;

        connection
            .outbound
            .send(Message::Text(text.into()))
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&mut self) {
        if let Some(connection) = &self.connection {
            connection.cancel.cancel();
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(connection) = &self.connection {
            connection.cancel.cancel();
        }
    }
}

/// Sends one connection's events, tagged with its id.
struct Reporter {
    id: ConnectionId,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl Reporter {
    fn send(&self, event: TransportEvent) {
        // The runtime may already be gone during shutdown.
        let _ = self.events.send(ConnectionEvent::new(self.id, event));
    }
}

/// Drive one connection until it ends, reporting events as they happen.
async fn run_connection(
    url: String,
    events: Reporter,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    tracing::info!(url = %url, connection = %events.id, "Connecting to stream");

    let connected = tokio::select! {
        () = cancel.cancelled() => {
            tracing::info!("Connection cancelled before handshake completed");
            events.send(TransportEvent::Closed);
            return;
        }
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket connection failed");
            events.send(TransportEvent::Error(e.to_string()));
            events.send(TransportEvent::Closed);
            return;
        }
    };

    events.send(TransportEvent::Opened);
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                break;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write.send(frame).await {
                    tracing::warn!(error = %e, "WebSocket send failed");
                    events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        events.send(TransportEvent::Message(text.as_str().to_string()));
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            events.send(TransportEvent::Message(text));
                        }
                        Err(_) => tracing::debug!(len = data.len(), "Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            tracing::debug!(error = %e, "Pong not delivered");
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server sent close frame");
                        break;
                    }
                    Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket error");
                        events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    events.send(TransportEvent::Closed);
}
