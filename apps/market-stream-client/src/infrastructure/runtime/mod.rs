//! Session Runtime
//!
//! Hosts a [`Session`] on a single tokio task. Operator commands, transport
//! events and auto-login timers are applied one at a time in arrival order,
//! so the session never sees concurrent mutation.
//!
//! # Outputs
//!
//! After every input the runtime:
//! - forwards new notifications on a broadcast channel,
//! - publishes a fresh [`SessionSnapshot`] into shared state,
//! - records the snapshot's metrics.
//!
//! # Usage
//!
//! ```ignore
//! let (runtime, handle) = SessionRuntime::new(session, transport_events, cancel.clone());
//! tokio::spawn(runtime.run());
//! handle.connect().await?;
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ConnectionEvent, KeyValueStore, Transport};
use crate::application::services::{ScheduledLogin, Session, SessionError, SessionSnapshot};
use crate::domain::notification::Notification;
use crate::domain::session::{Credentials, StreamKind};
use crate::infrastructure::metrics;

/// Shared, latest session snapshot.
pub type SharedSnapshot = Arc<RwLock<SessionSnapshot>>;

/// Capacity of the command queue.
const COMMAND_CAPACITY: usize = 64;

/// Capacity of the notification broadcast channel.
const NOTIFICATION_CAPACITY: usize = 1_024;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Runtime errors seen by handle callers.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime task is no longer running.
    #[error("session runtime stopped")]
    Stopped,

    /// The session rejected the command.
    #[error(transparent)]
    Session(#[from] SessionError),
}

enum Command {
    Connect(Reply<()>),
    Disconnect(Reply<()>),
    Login(Reply<()>),
    Logout(Reply<()>),
    Subscribe {
        tokens: Vec<String>,
        kind: StreamKind,
        reply: Reply<usize>,
    },
    Unsubscribe {
        token: String,
        kind: StreamKind,
        reply: Reply<()>,
    },
    SetCredentials {
        credentials: Credentials,
        reply: Reply<()>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle for issuing commands and observing state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: SharedSnapshot,
    notifications: broadcast::Sender<Notification>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect(_) => "Connect",
            Self::Disconnect(_) => "Disconnect",
            Self::Login(_) => "Login",
            Self::Logout(_) => "Logout",
            Self::Subscribe { .. } => "Subscribe",
            Self::Unsubscribe { .. } => "Unsubscribe",
            Self::SetCredentials { .. } => "SetCredentials",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    /// Open the transport.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`RuntimeError::Stopped`].
    pub async fn connect(&self) -> Result<(), RuntimeError> {
        self.request(Command::Connect).await
    }

    /// Close the transport and reset local state.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Stopped`] if the runtime has exited.
    pub async fn disconnect(&self) -> Result<(), RuntimeError> {
        self.request(Command::Disconnect).await
    }

    /// Send the login request.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`RuntimeError::Stopped`].
    pub async fn login(&self) -> Result<(), RuntimeError> {
        self.request(Command::Login).await
    }

    /// Send the logout request and reset local state.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`RuntimeError::Stopped`].
    pub async fn logout(&self) -> Result<(), RuntimeError> {
        self.request(Command::Logout).await
    }

    /// Subscribe comma-delimited tokens. Returns the number newly registered.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`RuntimeError::Stopped`].
    pub async fn subscribe<I>(&self, tokens: I, kind: StreamKind) -> Result<usize, RuntimeError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let tokens = tokens.into_iter().map(Into::into).collect();
        self.request(|reply| Command::Subscribe {
            tokens,
            kind,
            reply,
        })
        .await
    }

    /// Unsubscribe one token.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`RuntimeError::Stopped`].
    pub async fn unsubscribe(
        &self,
        token: impl Into<String>,
        kind: StreamKind,
    ) -> Result<(), RuntimeError> {
        let token = token.into();
        self.request(|reply| Command::Unsubscribe { token, kind, reply })
            .await
    }

    /// Replace the session credentials.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`RuntimeError::Stopped`].
    pub async fn set_credentials(&self, credentials: Credentials) -> Result<(), RuntimeError> {
        self.request(|reply| Command::SetCredentials { credentials, reply })
            .await
    }

    /// Get the latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }

    /// Get the shared snapshot for read-only consumers.
    #[must_use]
    pub fn shared_snapshot(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Subscribe to the notification stream.
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        Ok(response.await.map_err(|_| RuntimeError::Stopped)??)
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// Event loop owning a session.
pub struct SessionRuntime<T, S> {
    session: Session<T, S>,
    commands: mpsc::Receiver<Command>,
    transport_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    timers_tx: mpsc::UnboundedSender<u64>,
    timers_rx: mpsc::UnboundedReceiver<u64>,
    snapshot: SharedSnapshot,
    notifications: broadcast::Sender<Notification>,
    cancel: CancellationToken,
}

impl<T, S> SessionRuntime<T, S>
where
    T: Transport + 'static,
    S: KeyValueStore + 'static,
{
    /// Create a runtime and its handle.
    ///
    /// `transport_events` must be the receiving side of the channel the
    /// session's transport reports into.
    pub fn new(
        session: Session<T, S>,
        transport_events: mpsc::UnboundedReceiver<ConnectionEvent>,
        cancel: CancellationToken,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (timers_tx, timers_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let snapshot = Arc::new(RwLock::new(session.snapshot()));

        let handle = SessionHandle {
            commands: commands_tx,
            snapshot: Arc::clone(&snapshot),
            notifications: notifications.clone(),
        };

        let runtime = Self {
            session,
            commands,
            transport_events,
            timers_tx,
            timers_rx,
            snapshot,
            notifications,
            cancel,
        };
        (runtime, handle)
    }

    /// Run until cancelled. Returns the session after disposing it.
    pub async fn run(mut self) -> Session<T, S> {
        tracing::info!("Session runtime started");
        self.publish();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => self.apply_command(command),
                Some(ConnectionEvent { connection, event }) = self.transport_events.recv() => {
                    tracing::trace!(connection = %connection, event = ?event, "Transport event");
                    if let Some(login) = self.session.handle_transport_event(connection, event) {
                        self.schedule(login);
                    }
                }
                Some(id) = self.timers_rx.recv() => {
                    if let Err(e) = self.session.on_auto_login_due(id) {
                        self.reject("auto-login", &e);
                    }
                }
            }
            self.publish();
        }

        self.session.dispose();
        self.publish();
        tracing::info!("Session runtime stopped");
        self.session
    }

    fn apply_command(&mut self, command: Command) {
        tracing::debug!(command = ?command, "Applying command");
        match command {
            Command::Connect(reply) => {
                let result = self.session.connect();
                self.respond("connect", reply, result);
            }
            Command::Disconnect(reply) => {
                self.session.disconnect();
                let _ = reply.send(Ok(()));
            }
            Command::Login(reply) => {
                let result = self.session.login();
                self.respond("login", reply, result);
            }
            Command::Logout(reply) => {
                let result = self.session.logout();
                self.respond("logout", reply, result);
            }
            Command::Subscribe {
                tokens,
                kind,
                reply,
            } => {
                let result = self.session.subscribe(&tokens, kind);
                self.respond("subscribe", reply, result);
            }
            Command::Unsubscribe { token, kind, reply } => {
                let result = self.session.unsubscribe(&token, kind);
                self.respond("unsubscribe", reply, result);
            }
            Command::SetCredentials { credentials, reply } => {
                let result = self.session.set_credentials(credentials);
                self.respond("set credentials", reply, result);
            }
        }
    }

    fn respond<R>(&self, action: &str, reply: Reply<R>, result: Result<R, SessionError>) {
        if let Err(e) = &result {
            self.reject(action, e);
        }
        let _ = reply.send(result);
    }

    fn reject(&self, action: &str, error: &SessionError) {
        tracing::warn!(action, error = %error, "Command rejected");
        let _ = self
            .notifications
            .send(Notification::error(format!("{action}: {error}")));
    }

    fn schedule(&self, login: ScheduledLogin) {
        let timers = self.timers_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = login.cancel.cancelled() => {
                    tracing::debug!(id = login.id, "Auto-login cancelled");
                }
                () = tokio::time::sleep(login.delay) => {
                    let _ = timers.send(login.id);
                }
            }
        });
    }

    fn publish(&mut self) {
        for notification in self.session.drain_notifications() {
            let _ = self.notifications.send(notification);
        }

        let snapshot = self.session.snapshot();
        metrics::record_snapshot(&snapshot);
        *self.snapshot.write() = snapshot;
    }
}

impl<T, S> std::fmt::Debug for SessionRuntime<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRuntime")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
