//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `Session`: Connection/auth state machine, subscription replay and
//!   market data ingestion
//! - `SessionStore`: Typed persistence of credentials, subscriptions and the
//!   login flag on top of a `KeyValueStore`

mod persistence;
mod session;

pub use persistence::{CREDENTIALS_KEY, LOGGED_IN_KEY, SUBSCRIPTIONS_KEY, SessionStore};
pub use session::{
    DEFAULT_AUTO_LOGIN_DELAY, ScheduledLogin, Session, SessionError, SessionSettings,
    SessionSnapshot, SessionStats,
};
