//! Typed session persistence on top of a [`KeyValueStore`].
//!
//! Three logical records are kept: credentials, the subscription set (a JSON
//! list of [`SubscriptionKey`]) and the last-known login flag. Malformed
//! stored values are logged and treated as absent.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::ports::KeyValueStore;
use crate::domain::session::Credentials;
use crate::domain::subscription::SubscriptionKey;

/// Key of the saved credentials record.
pub const CREDENTIALS_KEY: &str = "stream.credentials";

/// Key of the saved subscription set.
pub const SUBSCRIPTIONS_KEY: &str = "stream.subscriptions";

/// Key of the last-known login flag.
pub const LOGGED_IN_KEY: &str = "stream.loggedIn";

/// Typed accessors for the session's persisted records.
#[derive(Debug)]
pub struct SessionStore<S> {
    inner: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Wrap a key/value store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Get the underlying store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Load saved credentials. Invalid records are ignored.
    pub fn load_credentials(&self) -> Option<Credentials> {
        let credentials: Credentials = self.load_json(CREDENTIALS_KEY)?;
        match credentials.validate() {
            Ok(()) => Some(credentials),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid saved credentials");
                None
            }
        }
    }

    /// Save credentials.
    pub fn save_credentials(&mut self, credentials: &Credentials) {
        self.save_json(CREDENTIALS_KEY, credentials);
    }

    /// Load the saved subscription set.
    pub fn load_subscriptions(&self) -> Option<Vec<SubscriptionKey>> {
        self.load_json(SUBSCRIPTIONS_KEY)
    }

    /// Save the subscription set.
    pub fn save_subscriptions(&mut self, keys: &[SubscriptionKey]) {
        self.save_json(SUBSCRIPTIONS_KEY, &keys);
    }

    /// Remove the saved subscription set.
    pub fn clear_subscriptions(&mut self) {
        self.inner.remove(SUBSCRIPTIONS_KEY);
    }

    /// Load the login flag. Missing or malformed means `false`.
    pub fn load_login_flag(&self) -> bool {
        self.load_json(LOGGED_IN_KEY).unwrap_or(false)
    }

    /// Save the login flag.
    pub fn save_login_flag(&mut self, logged_in: bool) {
        self.save_json(LOGGED_IN_KEY, &logged_in);
    }

    /// Remove the login flag.
    pub fn clear_login_flag(&mut self) {
        self.inner.remove(LOGGED_IN_KEY);
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring malformed stored value");
                None
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.inner.set(key, &json),
            Err(e) => tracing::warn!(key, error = %e, "Failed to serialize value for storage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::mock;
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::session::StreamKind;

    mock! {
        Store {}

        impl KeyValueStore for Store {
            fn get(&self, key: &str) -> Option<String>;
            fn set(&mut self, key: &str, value: &str);
            fn remove(&mut self, key: &str);
        }
    }

    #[test]
    fn saves_subscriptions_as_json_list() {
        let mut mock = MockStore::new();
        mock.expect_set()
            .with(
                eq(SUBSCRIPTIONS_KEY),
                eq(r#"[{"token":"NSECM:2885","kind":"ltpinfo"}]"#),
            )
            .times(1)
            .return_const(());

        let mut store = SessionStore::new(mock);
        store.save_subscriptions(&[SubscriptionKey::new("NSECM:2885", StreamKind::LtpInfo)]);
    }

    #[test]
    fn loads_subscriptions() {
        let mut mock = MockStore::new();
        mock.expect_get()
            .with(eq(SUBSCRIPTIONS_KEY))
            .return_const(Some(
                r#"[{"token":"A","kind":"marketPicture"},{"token":"B","kind":"ltpinfo"}]"#
                    .to_string(),
            ));

        let store = SessionStore::new(mock);
        let keys = store.load_subscriptions().unwrap();
        assert_eq!(
            keys,
            vec![
                SubscriptionKey::new("A", StreamKind::MarketPicture),
                SubscriptionKey::new("B", StreamKind::LtpInfo),
            ]
        );
    }

    #[test]
    fn malformed_values_are_ignored() {
        let mut mock = MockStore::new();
        mock.expect_get().return_const(Some("{not json".to_string()));

        let store = SessionStore::new(mock);
        assert!(store.load_subscriptions().is_none());
        assert!(store.load_credentials().is_none());
        assert!(!store.load_login_flag());
    }

    #[test]
    fn invalid_credentials_are_ignored() {
        let mut mock = MockStore::new();
        mock.expect_get().with(eq(CREDENTIALS_KEY)).return_const(Some(
            r#"{"gscid":"","gcid":"218","sessionId":"s","deviceId":"d"}"#.to_string(),
        ));

        let store = SessionStore::new(mock);
        assert!(store.load_credentials().is_none());
    }

    #[test]
    fn credentials_round_trip_through_camel_case_record() {
        let mut mock = MockStore::new();
        mock.expect_set()
            .with(
                eq(CREDENTIALS_KEY),
                eq(r#"{"gscid":"KS02","gcid":"218","sessionId":"dummy-session","deviceId":"dummy-device"}"#),
            )
            .times(1)
            .return_const(());

        let mut store = SessionStore::new(mock);
        let credentials =
            Credentials::new("KS02", "218", "dummy-session", "dummy-device").unwrap();
        store.save_credentials(&credentials);
    }

    #[test]
    fn clears_flag_and_subscriptions() {
        let mut mock = MockStore::new();
        mock.expect_remove()
            .with(eq(LOGGED_IN_KEY))
            .times(1)
            .return_const(());
        mock.expect_remove()
            .with(eq(SUBSCRIPTIONS_KEY))
            .times(1)
            .return_const(());

        let mut store = SessionStore::new(mock);
        store.clear_login_flag();
        store.clear_subscriptions();
    }

    #[test]
    fn login_flag_defaults_to_false() {
        let mut mock = MockStore::new();
        mock.expect_get().return_const(None::<String>);

        let store = SessionStore::new(mock);
        assert!(!store.load_login_flag());
    }
}
