//! Session State Machine
//!
//! Owns the connection and authentication status, the subscription registry
//! and the market data store. Commands come from the operator surface,
//! events come from the transport; both are applied one at a time by
//! whoever hosts the session (see `infrastructure::runtime`).
//!
//! # Authentication
//!
//! `login()` only sends the request. The session becomes `LoggedIn` when a
//! confirmation frame arrives, at which point every registry entry is
//! replayed as a subscribe request.
//!
//! # Auto-Login
//!
//! When the transport opens and either the persisted login flag is set or
//! the registry holds restored subscriptions, the session returns a
//! [`ScheduledLogin`]. The host sleeps for the given delay and then calls
//! [`Session::on_auto_login_due`] with its id. Disconnect, close, error and
//! a confirmed login all cancel the pending login; a stale id is ignored.
//!
//! # Connection Identity
//!
//! Each successful `connect()` records the [`ConnectionId`] returned by the
//! transport. Events tagged with any other id belong to a superseded
//! connection and are dropped. After `disconnect()` the session is closing:
//! only the `Closed` event of the active connection is applied, so frames
//! already in flight cannot log the session back in or refill the store.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::persistence::SessionStore;
use crate::application::ports::{
    ConnectionId, KeyValueStore, Transport, TransportError, TransportEvent,
};
use crate::domain::market_data::{MarketDataStore, MarketRecord, Symbol};
use crate::domain::notification::Notification;
use crate::domain::protocol::{CodecError, ProtocolCodec, ProtocolOptions, RequestEnvelope};
use crate::domain::session::{
    AuthStatus, ConnectionStatus, Credentials, CredentialsError, StreamKind,
};
use crate::domain::subscription::{
    SubscriptionKey, SubscriptionRegistry, Token, parse_tokens,
};

/// Default settle delay before an automatic login.
pub const DEFAULT_AUTO_LOGIN_DELAY: Duration = Duration::from_secs(1);

// =============================================================================
// Errors
// =============================================================================

/// Session command errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport is not open.
    #[error("not connected")]
    NotConnected,

    /// The session is not logged in.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A connection is already in progress or open.
    #[error("already {0}")]
    AlreadyActive(ConnectionStatus),

    /// No credentials have been set.
    #[error("no credentials set")]
    MissingCredentials,

    /// Credentials failed validation.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(#[from] CredentialsError),

    /// The transport rejected the operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A request could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// Settings & Scheduling
// =============================================================================

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Delay between transport open and the automatic login.
    pub auto_login_delay: Duration,
    /// Static request options.
    pub protocol: ProtocolOptions,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_login_delay: DEFAULT_AUTO_LOGIN_DELAY,
            protocol: ProtocolOptions::default(),
        }
    }
}

/// A login the host must fire after `delay` unless `cancel` is triggered.
#[derive(Debug, Clone)]
pub struct ScheduledLogin {
    /// Identifier to pass back to [`Session::on_auto_login_due`].
    pub id: u64,
    /// How long to wait.
    pub delay: Duration,
    /// Cancelled when the login is superseded.
    pub cancel: CancellationToken,
}

#[derive(Debug)]
struct PendingLogin {
    id: u64,
    cancel: CancellationToken,
}

// =============================================================================
// Observable State
// =============================================================================

/// Counters maintained by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames handed to the transport.
    pub frames_sent: u64,
    /// Frames received from the transport.
    pub frames_received: u64,
    /// Inbound frames that were not valid JSON.
    pub decode_failures: u64,
    /// Login confirmations received.
    pub logins_confirmed: u64,
    /// Subscribe requests sent by replay.
    pub subscriptions_replayed: u64,
}

/// Point-in-time view of the session for the rendering surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    /// Connection status.
    pub connection: ConnectionStatus,
    /// Authentication status.
    pub auth: AuthStatus,
    /// Whether credentials are set.
    pub has_credentials: bool,
    /// Registered subscriptions in insertion order.
    pub subscriptions: Vec<SubscriptionKey>,
    /// Market records by symbol.
    pub market_data: BTreeMap<Symbol, MarketRecord>,
    /// Counters.
    pub stats: SessionStats,
}

// =============================================================================
// Session
// =============================================================================

/// Streaming session state machine.
pub struct Session<T, S> {
    transport: T,
    store: SessionStore<S>,
    codec: ProtocolCodec,
    auto_login_delay: Duration,
    credentials: Option<Credentials>,
    connection: ConnectionStatus,
    active_connection: Option<ConnectionId>,
    closing: bool,
    auth: AuthStatus,
    registry: SubscriptionRegistry,
    market_data: MarketDataStore,
    pending_login: Option<PendingLogin>,
    next_login_id: u64,
    notifications: Vec<Notification>,
    stats: SessionStats,
}

impl<T: Transport, S: KeyValueStore> Session<T, S> {
    /// Create a session, restoring credentials and subscriptions from `store`.
    pub fn new(transport: T, store: S, settings: SessionSettings) -> Self {
        let store = SessionStore::new(store);
        let credentials = store.load_credentials();
        let registry =
            SubscriptionRegistry::from_keys(store.load_subscriptions().unwrap_or_default());

        tracing::info!(
            has_credentials = credentials.is_some(),
            subscriptions = registry.len(),
            "Session restored from storage"
        );

        Self {
            transport,
            store,
            codec: ProtocolCodec::new(settings.protocol),
            auto_login_delay: settings.auto_login_delay,
            credentials,
            connection: ConnectionStatus::Disconnected,
            active_connection: None,
            closing: false,
            auth: AuthStatus::LoggedOut,
            registry,
            market_data: MarketDataStore::new(),
            pending_login: None,
            next_login_id: 0,
            notifications: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Get the connection status.
    pub const fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Get the id of the connection whose events are applied, if any.
    pub const fn active_connection(&self) -> Option<ConnectionId> {
        self.active_connection
    }

    /// Check whether a disconnect is waiting for its close event.
    pub const fn is_closing(&self) -> bool {
        self.closing
    }

    /// Get the authentication status.
    pub const fn auth(&self) -> AuthStatus {
        self.auth
    }

    /// Get the current credentials.
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Get the subscription registry.
    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Get the market data store.
    pub const fn market_data(&self) -> &MarketDataStore {
        &self.market_data
    }

    /// Get the counters.
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Check whether an automatic login is pending.
    pub const fn has_pending_login(&self) -> bool {
        self.pending_login.is_some()
    }

    /// Get the transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the persisted records.
    pub const fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// Take all notifications produced since the last call.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Build a snapshot of the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection,
            auth: self.auth,
            has_credentials: self.credentials.is_some(),
            subscriptions: self.registry.entries().to_vec(),
            market_data: self.market_data.snapshot(),
            stats: self.stats,
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Replace and persist the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if `gscid` or `gcid` is empty.
    pub fn set_credentials(&mut self, credentials: Credentials) -> Result<(), SessionError> {
        credentials.validate()?;
        self.store.save_credentials(&credentials);
        tracing::info!(credentials = ?credentials, "Credentials updated");
        self.notify(Notification::info("Credentials saved"));
        self.credentials = Some(credentials);
        Ok(())
    }

    /// Open the transport.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyActive`] unless disconnected or in error,
    /// or a transport error if the connection cannot be started.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if !self.connection.can_connect() {
            return Err(SessionError::AlreadyActive(self.connection));
        }

        self.connection = ConnectionStatus::Connecting;
        tracing::info!("Connecting to stream");
        self.notify(Notification::info("Connecting"));

        match self.transport.open() {
            Ok(id) => {
                tracing::debug!(connection = %id, "Transport opening");
                self.active_connection = Some(id);
                self.closing = false;
                Ok(())
            }
            Err(e) => {
                self.connection = ConnectionStatus::Error;
                self.active_connection = None;
                tracing::error!(error = %e, "Failed to open transport");
                Err(e.into())
            }
        }
    }

    /// Close the transport and reset all local session state.
    ///
    /// The connection status itself is updated by the close event. Until it
    /// arrives, every other event of the closing connection is dropped.
    pub fn disconnect(&mut self) {
        self.cancel_pending_login();
        self.closing = self.active_connection.is_some();
        self.transport.close();
        self.reset_local();
        tracing::info!("Disconnected; session state cleared");
        self.notify(Notification::info("Disconnected"));
    }

    /// Send the login request. A no-op if already logged in.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] unless connected, or
    /// [`SessionError::MissingCredentials`] if no credentials are set.
    pub fn login(&mut self) -> Result<(), SessionError> {
        if self.connection != ConnectionStatus::Connected {
            return Err(SessionError::NotConnected);
        }
        if self.auth.is_logged_in() {
            tracing::debug!("Login skipped, already logged in");
            return Ok(());
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SessionError::MissingCredentials)?;
        let envelope = self.codec.login(credentials);
        self.send(&envelope)?;
        tracing::info!("Login request sent");
        Ok(())
    }

    /// Send the logout request and reset local session state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] unless connected, or
    /// [`SessionError::MissingCredentials`] if no credentials are set.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if self.connection != ConnectionStatus::Connected {
            return Err(SessionError::NotConnected);
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SessionError::MissingCredentials)?;
        let envelope = self.codec.logout(credentials);
        self.send(&envelope)?;

        self.cancel_pending_login();
        self.reset_local();
        tracing::info!("Logged out; session state cleared");
        self.notify(Notification::info("Logged out"));
        Ok(())
    }

    /// Subscribe to each comma-delimited token in `tokens`.
    ///
    /// One request is sent per token even if the pair is already registered.
    /// Returns the number of pairs newly added to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAuthenticated`] unless logged in,
    /// [`SessionError::NotConnected`] unless connected, or a transport error.
    /// Pairs sent before a transport error are still registered.
    pub fn subscribe<I>(&mut self, tokens: I, kind: StreamKind) -> Result<usize, SessionError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if !self.auth.is_logged_in() {
            return Err(SessionError::NotAuthenticated);
        }
        if self.connection != ConnectionStatus::Connected {
            return Err(SessionError::NotConnected);
        }
        let credentials = self
            .credentials
            .clone()
            .ok_or(SessionError::MissingCredentials)?;

        let tokens: Vec<Token> = tokens
            .into_iter()
            .flat_map(|input| parse_tokens(input.as_ref()))
            .collect();

        let mut sent = Vec::with_capacity(tokens.len());
        let mut failure = None;
        for token in tokens {
            let envelope = self.codec.subscribe(&credentials, &token, kind);
            if let Err(e) = self.send(&envelope) {
                failure = Some(e);
                break;
            }
            sent.push(SubscriptionKey::new(token, kind));
        }

        let added = self.registry.extend(sent);
        self.persist_subscriptions();
        tracing::info!(kind = %kind, added, total = self.registry.len(), "Subscribed");

        match failure {
            Some(e) => Err(e),
            None => Ok(added),
        }
    }

    /// Unsubscribe one token and drop its market record.
    ///
    /// Authentication is not required.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] unless connected,
    /// [`SessionError::MissingCredentials`] if no credentials are set, or a
    /// transport error.
    pub fn unsubscribe(&mut self, token: &str, kind: StreamKind) -> Result<(), SessionError> {
        if self.connection != ConnectionStatus::Connected {
            return Err(SessionError::NotConnected);
        }

        let token = token.trim();
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SessionError::MissingCredentials)?;
        let envelope = self.codec.unsubscribe(credentials, token, kind);
        self.send(&envelope)?;

        let removed = self.registry.remove(token, kind);
        self.market_data.remove(token);
        self.persist_subscriptions();
        tracing::info!(token, kind = %kind, removed, "Unsubscribed");
        Ok(())
    }

    /// Cancel any pending login and close the transport without touching
    /// persisted state.
    pub fn dispose(&mut self) {
        self.cancel_pending_login();
        self.transport.close();
        self.connection = ConnectionStatus::Disconnected;
        self.active_connection = None;
        self.closing = false;
        self.auth = AuthStatus::LoggedOut;
        tracing::debug!("Session disposed");
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Apply an event reported by connection `connection`.
    ///
    /// Events from a superseded connection, and all but `Closed` while
    /// closing, are dropped. Returns a login the host must schedule, if the
    /// event calls for one.
    pub fn handle_transport_event(
        &mut self,
        connection: ConnectionId,
        event: TransportEvent,
    ) -> Option<ScheduledLogin> {
        if self.active_connection != Some(connection) {
            tracing::debug!(
                connection = %connection,
                event = ?event,
                "Dropping event from superseded connection"
            );
            return None;
        }
        if self.closing && event != TransportEvent::Closed {
            tracing::debug!(
                connection = %connection,
                event = ?event,
                "Dropping event while closing"
            );
            return None;
        }

        match event {
            TransportEvent::Opened => {
                self.connection = ConnectionStatus::Connected;
                tracing::info!("Transport opened");
                self.notify(Notification::success("Connection opened"));

                let wants_login = self.store.load_login_flag() || !self.registry.is_empty();
                wants_login.then(|| self.schedule_login())
            }
            TransportEvent::Message(text) => {
                self.handle_message(text);
                None
            }
            TransportEvent::Error(message) => {
                self.connection = ConnectionStatus::Error;
                self.auth = AuthStatus::LoggedOut;
                self.cancel_pending_login();
                tracing::warn!(error = %message, "Transport error");
                self.notify(Notification::error(message));
                None
            }
            TransportEvent::Closed => {
                self.connection = ConnectionStatus::Disconnected;
                self.active_connection = None;
                self.closing = false;
                self.auth = AuthStatus::LoggedOut;
                self.cancel_pending_login();
                tracing::info!(
                    subscriptions = self.registry.len(),
                    "Transport closed"
                );
                self.notify(Notification::info("Connection closed"));
                None
            }
        }
    }

    /// Fire a scheduled login. Stale or superseded ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`Session::login`] error if the login cannot be sent.
    pub fn on_auto_login_due(&mut self, id: u64) -> Result<(), SessionError> {
        if !self.pending_login.as_ref().is_some_and(|p| p.id == id) {
            tracing::debug!(id, "Ignoring stale auto-login");
            return Ok(());
        }
        self.pending_login = None;

        if self.connection != ConnectionStatus::Connected || self.auth.is_logged_in() {
            return Ok(());
        }
        tracing::info!("Auto-login");
        self.login()
    }

    fn handle_message(&mut self, text: String) {
        self.stats.frames_received += 1;

        let frame = match self.codec.decode(&text) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.decode_failures += 1;
                tracing::warn!(error = %e, "Received undecodable frame");
                self.notify(Notification::received(text));
                return;
            }
        };

        tracing::debug!(frame = %text, "Received frame");
        self.notify(Notification::received(text));

        if frame.login_confirmed {
            self.on_login_confirmed();
        }
        if let Some(data) = frame.market_data {
            self.market_data.ingest(&data.symbol, &data.fields);
        }
    }

    fn on_login_confirmed(&mut self) {
        self.auth = AuthStatus::LoggedIn;
        self.stats.logins_confirmed += 1;
        self.store.save_login_flag(true);
        self.cancel_pending_login();
        tracing::info!("Login confirmed");
        self.notify(Notification::success("Logged in"));

        let Some(credentials) = self.credentials.clone() else {
            tracing::warn!("Login confirmed without credentials; skipping replay");
            return;
        };

        let keys = self.registry.entries().to_vec();
        for key in &keys {
            let envelope = self.codec.subscribe(&credentials, &key.token, key.kind);
            if let Err(e) = self.send(&envelope) {
                tracing::warn!(error = %e, token = %key.token, "Subscription replay failed");
                self.notify(Notification::error(format!("Replay failed: {e}")));
                return;
            }
            self.stats.subscriptions_replayed += 1;
        }

        if !keys.is_empty() {
            tracing::info!(count = keys.len(), "Subscriptions replayed");
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn send(&mut self, envelope: &RequestEnvelope) -> Result<(), SessionError> {
        let text = self.codec.encode(envelope)?;
        self.transport.send(text.clone())?;
        self.stats.frames_sent += 1;
        tracing::debug!(
            request_type = ?envelope.request.request_type,
            streaming_type = envelope.request.streaming_type.as_str(),
            "Sent frame"
        );
        self.notify(Notification::sent(text));
        Ok(())
    }

    fn schedule_login(&mut self) -> ScheduledLogin {
        self.cancel_pending_login();
        self.next_login_id += 1;

        let cancel = CancellationToken::new();
        self.pending_login = Some(PendingLogin {
            id: self.next_login_id,
            cancel: cancel.clone(),
        });
        tracing::debug!(
            id = self.next_login_id,
            delay_ms = self.auto_login_delay.as_millis(),
            "Auto-login scheduled"
        );

        ScheduledLogin {
            id: self.next_login_id,
            delay: self.auto_login_delay,
            cancel,
        }
    }

    fn cancel_pending_login(&mut self) {
        if let Some(pending) = self.pending_login.take() {
            pending.cancel.cancel();
        }
    }

    fn reset_local(&mut self) {
        self.auth = AuthStatus::LoggedOut;
        self.registry.clear();
        self.market_data.clear();
        self.store.clear_subscriptions();
        self.store.clear_login_flag();
    }

    fn persist_subscriptions(&mut self) {
        self.store.save_subscriptions(self.registry.entries());
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

impl<T, S> std::fmt::Debug for Session<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .field("active_connection", &self.active_connection)
            .field("closing", &self.closing)
            .field("auth", &self.auth)
            .field("credentials", &self.credentials)
            .field("subscriptions", &self.registry.len())
            .field("records", &self.market_data.len())
            .field("pending_login", &self.pending_login.as_ref().map(|p| p.id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::application::services::LOGGED_IN_KEY;
    use crate::domain::notification::NotificationKind;

    #[derive(Debug, Default)]
    struct FakeTransport {
        open: bool,
        opened: ConnectionId,
        sent: Vec<String>,
        fail_open: bool,
    }

    impl Transport for FakeTransport {
        fn open(&mut self) -> Result<ConnectionId, TransportError> {
            if self.fail_open {
                return Err(TransportError::ConnectFailed("refused".to_string()));
            }
            self.open = true;
            self.opened = self.opened.next();
            Ok(self.opened)
        }

        fn send(&mut self, text: String) -> Result<(), TransportError> {
            if !self.open {
                return Err(TransportError::NotOpen);
            }
            self.sent.push(text);
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    #[derive(Debug, Default)]
    struct MapStore(HashMap<String, String>);

    impl KeyValueStore for MapStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }

        fn set(&mut self, key: &str, value: &str) {
            self.0.insert(key.to_string(), value.to_string());
        }

        fn remove(&mut self, key: &str) {
            self.0.remove(key);
        }
    }

    type TestSession = Session<FakeTransport, MapStore>;

    /// Deliver `event` on the active connection.
    fn emit(session: &mut TestSession, event: TransportEvent) -> Option<ScheduledLogin> {
        let connection = session.active_connection().unwrap_or_default();
        session.handle_transport_event(connection, event)
    }

    fn creds() -> Credentials {
        Credentials::new("KS02", "218", "dummy-session", "dummy-device").unwrap()
    }

    fn connected_session() -> TestSession {
        let mut session = Session::new(
            FakeTransport::default(),
            MapStore::default(),
            SessionSettings::default(),
        );
        session.set_credentials(creds()).unwrap();
        session.connect().unwrap();
        emit(&mut session, TransportEvent::Opened);
        session
    }

    const LOGIN_CONFIRM: &str = r#"{"response":{"svcName":"Broadcast","streamingType":"login"}}"#;

    #[test]
    fn connect_rejected_while_active() {
        let mut session = connected_session();
        assert!(matches!(
            session.connect(),
            Err(SessionError::AlreadyActive(ConnectionStatus::Connected))
        ));
    }

    #[test]
    fn connect_failure_sets_error() {
        let transport = FakeTransport {
            fail_open: true,
            ..FakeTransport::default()
        };
        let mut session = Session::new(transport, MapStore::default(), SessionSettings::default());

        assert!(matches!(session.connect(), Err(SessionError::Transport(_))));
        assert_eq!(session.connection(), ConnectionStatus::Error);
        assert!(session.connection().can_connect());
    }

    #[test]
    fn login_requires_connection() {
        let mut session =
            Session::new(FakeTransport::default(), MapStore::default(), SessionSettings::default());
        session.set_credentials(creds()).unwrap();
        assert!(matches!(session.login(), Err(SessionError::NotConnected)));
    }

    #[test]
    fn login_requires_credentials() {
        let mut session =
            Session::new(FakeTransport::default(), MapStore::default(), SessionSettings::default());
        session.connect().unwrap();
        emit(&mut session, TransportEvent::Opened);
        assert!(matches!(session.login(), Err(SessionError::MissingCredentials)));
    }

    #[test]
    fn login_does_not_authenticate_locally() {
        let mut session = connected_session();
        session.login().unwrap();
        assert_eq!(session.auth(), AuthStatus::LoggedOut);
        assert_eq!(session.transport().sent.len(), 1);
    }

    #[test]
    fn login_is_noop_when_logged_in() {
        let mut session = connected_session();
        emit(&mut session, TransportEvent::Message(LOGIN_CONFIRM.to_string()));
        session.login().unwrap();
        assert!(session.transport().sent.is_empty());
    }

    #[test]
    fn undecodable_frame_is_logged_as_received() {
        let mut session = connected_session();
        session.drain_notifications();

        emit(&mut session, TransportEvent::Message("garbage".to_string()));

        let notes = session.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Received);
        assert_eq!(notes[0].content, "garbage");
        assert_eq!(session.stats().decode_failures, 1);
        assert_eq!(session.connection(), ConnectionStatus::Connected);
    }

    #[test]
    fn error_event_keeps_registry() {
        let mut session = connected_session();
        emit(&mut session, TransportEvent::Message(LOGIN_CONFIRM.to_string()));
        session.subscribe(["A"], StreamKind::LtpInfo).unwrap();

        emit(&mut session, TransportEvent::Error("reset".to_string()));

        assert_eq!(session.connection(), ConnectionStatus::Error);
        assert_eq!(session.auth(), AuthStatus::LoggedOut);
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn opened_schedules_login_when_flag_persisted() {
        let mut store = MapStore::default();
        store.set(LOGGED_IN_KEY, "true");
        let mut session =
            Session::new(FakeTransport::default(), store, SessionSettings::default());
        session.set_credentials(creds()).unwrap();
        session.connect().unwrap();

        let scheduled = emit(&mut session, TransportEvent::Opened)
            .unwrap();
        assert_eq!(scheduled.delay, DEFAULT_AUTO_LOGIN_DELAY);
        assert!(session.has_pending_login());
    }

    #[test]
    fn opened_without_intent_schedules_nothing() {
        let mut session =
            Session::new(FakeTransport::default(), MapStore::default(), SessionSettings::default());
        session.connect().unwrap();
        assert!(emit(&mut session, TransportEvent::Opened).is_none());
    }

    #[test]
    fn stale_auto_login_is_ignored() {
        let mut store = MapStore::default();
        store.set(LOGGED_IN_KEY, "true");
        let mut session =
            Session::new(FakeTransport::default(), store, SessionSettings::default());
        session.set_credentials(creds()).unwrap();
        session.connect().unwrap();
        let first = emit(&mut session, TransportEvent::Opened)
            .unwrap();

        emit(&mut session, TransportEvent::Closed);
        assert!(first.cancel.is_cancelled());

        session.on_auto_login_due(first.id).unwrap();
        assert!(session.transport().sent.is_empty());
    }

    #[test]
    fn auto_login_sends_login_request() {
        let mut store = MapStore::default();
        store.set(LOGGED_IN_KEY, "true");
        let mut session =
            Session::new(FakeTransport::default(), store, SessionSettings::default());
        session.set_credentials(creds()).unwrap();
        session.connect().unwrap();
        let scheduled = emit(&mut session, TransportEvent::Opened)
            .unwrap();

        session.on_auto_login_due(scheduled.id).unwrap();

        assert_eq!(session.transport().sent.len(), 1);
        assert!(session.transport().sent[0].contains(r#""streamingType":"login""#));
        assert!(!session.has_pending_login());
    }

    #[test]
    fn events_from_superseded_connection_are_dropped() {
        let mut session = connected_session();
        let first = session.active_connection().unwrap();
        emit(&mut session, TransportEvent::Error("reset".to_string()));
        assert_eq!(session.connection(), ConnectionStatus::Error);

        session.connect().unwrap();
        let second = session.active_connection().unwrap();
        assert_ne!(first, second);

        session.handle_transport_event(first, TransportEvent::Closed);
        assert_eq!(session.connection(), ConnectionStatus::Connecting);

        session.handle_transport_event(first, TransportEvent::Opened);
        assert_eq!(session.connection(), ConnectionStatus::Connecting);

        session.handle_transport_event(second, TransportEvent::Opened);
        assert_eq!(session.connection(), ConnectionStatus::Connected);
    }

    #[test]
    fn closing_session_drops_everything_but_close() {
        let mut session = connected_session();
        session.login().unwrap();
        session.disconnect();
        assert!(session.is_closing());

        emit(&mut session, TransportEvent::Message(LOGIN_CONFIRM.to_string()));
        emit(&mut session, TransportEvent::Error("late".to_string()));
        assert_eq!(session.auth(), AuthStatus::LoggedOut);
        assert_eq!(session.connection(), ConnectionStatus::Connected);
        assert!(session.store().inner().get(LOGGED_IN_KEY).is_none());

        emit(&mut session, TransportEvent::Closed);
        assert!(!session.is_closing());
        assert_eq!(session.active_connection(), None);
        assert_eq!(session.connection(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn disconnect_while_idle_does_not_wait_for_close() {
        let mut session =
            Session::new(FakeTransport::default(), MapStore::default(), SessionSettings::default());
        session.disconnect();
        assert!(!session.is_closing());
    }

    #[test]
    fn set_credentials_rejects_invalid() {
        let mut session =
            Session::new(FakeTransport::default(), MapStore::default(), SessionSettings::default());
        let bad: Credentials = serde_json::from_str(
            r#"{"gscid":"","gcid":"218","sessionId":"s","deviceId":"d"}"#,
        )
        .unwrap();

        assert!(matches!(
            session.set_credentials(bad),
            Err(SessionError::InvalidCredentials(_))
        ));
        assert!(session.credentials().is_none());
    }

    #[test]
    fn debug_redacts_credentials() {
        let session = connected_session();
        let output = format!("{session:?}");
        assert!(output.contains("KS02"));
        assert!(!output.contains("dummy-session"));
    }
}
