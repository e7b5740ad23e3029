//! Client Configuration Settings
//!
//! Configuration types for the stream client, loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STREAM_URL` | required |
//! | `STREAM_STORE_PATH` | `./market-stream-state.json` |
//! | `STREAM_AUTO_LOGIN_DELAY_MS` | `1000` |
//! | `STREAM_DEVICE_TYPE` | `WEB` |
//! | `STREAM_RESPONSE_FORMAT` | `json` |
//! | `STREAM_STATUS_PORT` | `8083` (0 disables) |
//! | `STREAM_GSCID`, `STREAM_GCID`, `STREAM_SESSION_ID`, `STREAM_DEVICE_ID` | unset |

use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::{DEFAULT_AUTO_LOGIN_DELAY, SessionSettings};
use crate::domain::protocol::ProtocolOptions;
use crate::domain::session::Credentials;

/// Default location of the file store.
pub const DEFAULT_STORE_PATH: &str = "./market-stream-state.json";

/// Default status server port.
pub const DEFAULT_STATUS_PORT: u16 = 8083;

const SEED_CREDENTIAL_VARS: [&str; 4] = [
    "STREAM_GSCID",
    "STREAM_GCID",
    "STREAM_SESSION_ID",
    "STREAM_DEVICE_ID",
];

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// File store location.
    pub store_path: PathBuf,
    /// Session behavior.
    pub session: SessionSettings,
    /// Status server port (0 = disabled).
    pub status_port: u16,
    /// Credentials to seed the session with, if all four variables are set.
    pub seed_credentials: Option<Credentials>,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `STREAM_URL` is missing or empty, or if the seed
    /// credential variables are only partially set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("STREAM_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("STREAM_URL".to_string()))?
            .trim()
            .to_string();
        if url.is_empty() {
            return Err(ConfigError::EmptyValue("STREAM_URL".to_string()));
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue {
                key: "STREAM_URL".to_string(),
                reason: "must use the ws:// or wss:// scheme".to_string(),
            });
        }

        let store_path = non_empty(&lookup, "STREAM_STORE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from);

        let defaults = ProtocolOptions::default();
        let protocol = ProtocolOptions {
            response_format: non_empty(&lookup, "STREAM_RESPONSE_FORMAT")
                .unwrap_or(defaults.response_format),
            device_type: non_empty(&lookup, "STREAM_DEVICE_TYPE").unwrap_or(defaults.device_type),
        };

        let session = SessionSettings {
            auto_login_delay: parse_duration_millis(
                &lookup,
                "STREAM_AUTO_LOGIN_DELAY_MS",
                DEFAULT_AUTO_LOGIN_DELAY,
            ),
            protocol,
        };

        Ok(Self {
            url,
            store_path,
            session,
            status_port: parse_u16(&lookup, "STREAM_STATUS_PORT", DEFAULT_STATUS_PORT),
            seed_credentials: seed_credentials(&lookup)?,
        })
    }

    /// Check whether the status server is enabled.
    #[must_use]
    pub const fn status_enabled(&self) -> bool {
        self.status_port != 0
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn seed_credentials<F>(lookup: &F) -> Result<Option<Credentials>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = SEED_CREDENTIAL_VARS
        .iter()
        .map(|key| non_empty(lookup, key))
        .collect();

    match values.as_slice() {
        [None, None, None, None] => Ok(None),
        [Some(gscid), Some(gcid), Some(session_id), Some(device_id)] => {
            Credentials::new(gscid, gcid, session_id, device_id)
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "STREAM_GSCID".to_string(),
                    reason: e.to_string(),
                })
        }
        _ => {
            let missing = SEED_CREDENTIAL_VARS
                .iter()
                .zip(&values)
                .find(|(_, value)| value.is_none())
                .map_or("STREAM_GSCID", |(key, _)| *key);
            Err(ConfigError::MissingEnvVar(missing.to_string()))
        }
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
