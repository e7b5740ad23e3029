//! Configuration Module
//!
//! Configuration loading for the stream client.

mod settings;

pub use settings::{ClientConfig, ConfigError, DEFAULT_STATUS_PORT, DEFAULT_STORE_PATH};
