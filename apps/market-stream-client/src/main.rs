//! Market Stream Client Binary
//!
//! Runs a streaming session with a line-oriented operator console on stdin.
//!
//! # Usage
//!
//! ```bash
//! STREAM_URL=wss://venue.example/stream cargo run --bin market-stream-client
//! ```
//!
//! # Console Commands
//!
//! - `connect`, `disconnect`, `login`, `logout`
//! - `sub <tokens> <kind>`: comma-delimited tokens, kind `ltpinfo` | `marketPicture`
//! - `unsub <token> <kind>`
//! - `creds <gscid> <gcid> <sessionId> <deviceId>`
//! - `status`, `help`, `quit`
//!
//! # Environment Variables
//!
//! ## Required
//! - `STREAM_URL`: WebSocket endpoint
//!
//! ## Optional
//! - `STREAM_STORE_PATH`: State file (default: ./market-stream-state.json)
//! - `STREAM_AUTO_LOGIN_DELAY_MS`: Auto-login settle delay (default: 1000)
//! - `STREAM_DEVICE_TYPE`: Device class sent on login (default: WEB)
//! - `STREAM_RESPONSE_FORMAT`: Response format sent on login (default: json)
//! - `STREAM_STATUS_PORT`: Status HTTP port, 0 disables (default: 8083)
//! - `STREAM_GSCID`, `STREAM_GCID`, `STREAM_SESSION_ID`, `STREAM_DEVICE_ID`: Seed credentials
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`: Tracing export
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use market_stream_client::infrastructure::telemetry;
use market_stream_client::{
    ClientConfig, Credentials, FileStore, Notification, Session, SessionHandle, SessionRuntime,
    StatusServer, StatusServerState, StreamKind, WebSocketTransport, init_metrics,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Market Stream Client");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = ClientConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store = FileStore::open(config.store_path.clone());
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let transport = WebSocketTransport::new(config.url.clone(), event_tx);
    let session = Session::new(transport, store, config.session.clone());

    let (runtime, handle) = SessionRuntime::new(session, event_rx, shutdown_token.clone());
    let runtime_task = tokio::spawn(runtime.run());

    if let Some(credentials) = config.seed_credentials.clone() {
        handle
            .set_credentials(credentials)
            .await
            .context("failed to apply seed credentials")?;
    }

    if config.status_enabled() {
        let state = Arc::new(StatusServerState::new(
            env!("CARGO_PKG_VERSION"),
            handle.shared_snapshot(),
        ));
        let server = StatusServer::new(config.status_port, state, shutdown_token.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(error = %e, "Status server error");
            }
        });
    }

    tokio::spawn(print_notifications(
        handle.notifications(),
        shutdown_token.clone(),
    ));

    tracing::info!("Market stream client ready");
    println!("Type `help` for commands.");

    tokio::select! {
        () = run_console(handle, shutdown_token.clone()) => {}
        () = await_shutdown() => {}
    }

    shutdown_token.cancel();
    if let Err(e) = runtime_task.await {
        tracing::error!(error = %e, "Session runtime panicked");
    }

    tracing::info!("Market stream client stopped");
    Ok(())
}

// =============================================================================
// Console
// =============================================================================

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Connect,
    Disconnect,
    Login,
    Logout,
    Subscribe { tokens: String, kind: StreamKind },
    Unsubscribe { token: String, kind: StreamKind },
    Credentials(Credentials),
    Status,
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  connect | disconnect | login | logout
  sub <tokens> <ltpinfo|marketPicture>    tokens are comma-delimited
  unsub <token> <ltpinfo|marketPicture>
  creds <gscid> <gcid> <sessionId> <deviceId>
  status | help | quit";

impl ConsoleCommand {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("connect", []) => Self::Connect,
            ("disconnect", []) => Self::Disconnect,
            ("login", []) => Self::Login,
            ("logout", []) => Self::Logout,
            ("status", []) => Self::Status,
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            ("sub" | "subscribe", [tokens @ .., kind]) if !tokens.is_empty() => Self::Subscribe {
                tokens: tokens.join(""),
                kind: kind.parse()?,
            },
            ("unsub" | "unsubscribe", [token, kind]) => Self::Unsubscribe {
                token: (*token).to_string(),
                kind: kind.parse()?,
            },
            ("creds" | "credentials", [gscid, gcid, session_id, device_id]) => Self::Credentials(
                Credentials::new(*gscid, *gcid, *session_id, *device_id)
                    .map_err(|e| e.to_string())?,
            ),
            (verb, _) => return Err(format!("unrecognized command `{verb}`; try `help`")),
        };
        Ok(Some(command))
    }
}

/// Read commands from stdin until `quit`, EOF or shutdown.
async fn run_console(handle: SessionHandle, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };

        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            break;
        }
        execute(&handle, command).await;
    }
}

async fn execute(handle: &SessionHandle, command: ConsoleCommand) {
    // Rejections are reported on the notification stream.
    let _ = match command {
        ConsoleCommand::Connect => handle.connect().await,
        ConsoleCommand::Disconnect => handle.disconnect().await,
        ConsoleCommand::Login => handle.login().await,
        ConsoleCommand::Logout => handle.logout().await,
        ConsoleCommand::Subscribe { tokens, kind } => {
            handle.subscribe([tokens], kind).await.map(|added| {
                println!("{added} new subscription(s)");
            })
        }
        ConsoleCommand::Unsubscribe { token, kind } => handle.unsubscribe(token, kind).await,
        ConsoleCommand::Credentials(credentials) => handle.set_credentials(credentials).await,
        ConsoleCommand::Status => {
            match serde_json::to_string_pretty(&handle.snapshot()) {
                Ok(json) => println!("{json}"),
                Err(e) => println!("failed to render status: {e}"),
            }
            Ok(())
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };
}

/// Print notifications as they arrive.
async fn print_notifications(
    mut notifications: broadcast::Receiver<Notification>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            () = cancel.cancelled() => break,
            received = notifications.recv() => received,
        };

        match received {
            Ok(notification) => println!(
                "{} {:<8} {}",
                notification.timestamp.format("%H:%M:%S%.3f"),
                format!("{:?}", notification.kind).to_lowercase(),
                notification.content
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// =============================================================================
// Startup Helpers
// =============================================================================

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        url = %config.url,
        store_path = %config.store_path.display(),
        auto_login_delay_ms = config.session.auto_login_delay.as_millis(),
        status_port = config.status_port,
        seed_credentials = config.seed_credentials.is_some(),
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
