//! Subscription Registry
//!
//! Tracks the set of active `(token, kind)` subscriptions for the session.
//!
//! # Design
//!
//! The registry holds at most one entry per `(token, kind)` pair and keeps
//! insertion order, so replay after a fresh login re-issues subscriptions in
//! the order the operator made them. Wire requests are not deduplicated here:
//! the session always sends what the operator asked for and only the stored
//! set is de-duplicated.

use serde::{Deserialize, Serialize};

use crate::domain::session::StreamKind;

// =============================================================================
// Types
// =============================================================================

/// An exchange/segment-qualified symbol identifier, e.g. `NSECM:2885`.
pub type Token = String;

/// A single subscription entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    /// Subscribed token.
    pub token: Token,
    /// Stream granularity.
    pub kind: StreamKind,
}

impl SubscriptionKey {
    /// Create a new subscription key.
    #[must_use]
    pub fn new(token: impl Into<Token>, kind: StreamKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }
}

/// Split comma-delimited operator input into trimmed, non-empty tokens.
///
/// ```rust
/// use market_stream_client::domain::subscription::parse_tokens;
///
/// assert_eq!(parse_tokens(" NSECM:2885, ,NSECM:1234 "), vec!["NSECM:2885", "NSECM:1234"]);
/// ```
#[must_use]
pub fn parse_tokens(input: &str) -> Vec<Token> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Ordered, de-duplicated set of subscriptions.
///
/// # Example
///
/// ```rust
/// use market_stream_client::domain::session::StreamKind;
/// use market_stream_client::domain::subscription::{SubscriptionKey, SubscriptionRegistry};
///
/// let mut registry = SubscriptionRegistry::new();
/// assert!(registry.add(SubscriptionKey::new("NSECM:2885", StreamKind::LtpInfo)));
///
/// // Same pair again - no-op
/// assert!(!registry.add(SubscriptionKey::new("NSECM:2885", StreamKind::LtpInfo)));
///
/// // Same token, different kind - separate entry
/// assert!(registry.add(SubscriptionKey::new("NSECM:2885", StreamKind::MarketPicture)));
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionKey>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a registry from stored keys, dropping duplicates.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = SubscriptionKey>) -> Self {
        let mut registry = Self::new();
        registry.extend(keys);
        registry
    }

    /// Add a subscription.
    ///
    /// Returns `false` if the pair was already registered.
    pub fn add(&mut self, key: SubscriptionKey) -> bool {
        if self.entries.contains(&key) {
            return false;
        }
        self.entries.push(key);
        true
    }

    /// Add several subscriptions, returning how many were new.
    pub fn extend(&mut self, keys: impl IntoIterator<Item = SubscriptionKey>) -> usize {
        keys.into_iter().filter(|key| self.add(key.clone())).count()
    }

    /// Remove a subscription.
    ///
    /// Returns `false` if the pair was not registered.
    pub fn remove(&mut self, token: &str, kind: StreamKind) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !(entry.token == token && entry.kind == kind));
        self.entries.len() != before
    }

    /// Check whether a pair is registered.
    #[must_use]
    pub fn contains(&self, token: &str, kind: StreamKind) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.token == token && entry.kind == kind)
    }

    /// All registered entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[SubscriptionKey] {
        &self.entries
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn key(token: &str, kind: StreamKind) -> SubscriptionKey {
        SubscriptionKey::new(token, kind)
    }

    #[test]
    fn parse_tokens_trims_and_skips_empty() {
        assert_eq!(
            parse_tokens("NSECM:2885,NSECM:1234"),
            vec!["NSECM:2885".to_string(), "NSECM:1234".to_string()]
        );
        assert_eq!(parse_tokens("  , ,"), Vec::<String>::new());
        assert_eq!(parse_tokens(" NSEFO:35000 "), vec!["NSEFO:35000".to_string()]);
    }

    #[test]
    fn add_new_pair() {
        let mut registry = SubscriptionRegistry::new();

        assert!(registry.add(key("NSECM:2885", StreamKind::LtpInfo)));
        assert!(registry.contains("NSECM:2885", StreamKind::LtpInfo));
        assert!(!registry.contains("NSECM:2885", StreamKind::MarketPicture));
    }

    #[test]
    fn add_duplicate_pair_is_noop() {
        let mut registry = SubscriptionRegistry::new();

        registry.add(key("NSECM:2885", StreamKind::LtpInfo));
        assert!(!registry.add(key("NSECM:2885", StreamKind::LtpInfo)));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn extend_counts_only_new_pairs() {
        let mut registry = SubscriptionRegistry::new();
        registry.add(key("A", StreamKind::LtpInfo));

        let added = registry.extend([
            key("A", StreamKind::LtpInfo),
            key("B", StreamKind::LtpInfo),
            key("B", StreamKind::LtpInfo),
        ]);

        assert_eq!(added, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_only_matching_kind() {
        let mut registry = SubscriptionRegistry::new();
        registry.add(key("A", StreamKind::LtpInfo));
        registry.add(key("A", StreamKind::MarketPicture));

        assert!(registry.remove("A", StreamKind::LtpInfo));
        assert!(!registry.remove("A", StreamKind::LtpInfo));

        assert_eq!(registry.entries(), &[key("A", StreamKind::MarketPicture)]);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let registry = SubscriptionRegistry::from_keys([
            key("C", StreamKind::LtpInfo),
            key("A", StreamKind::MarketPicture),
            key("C", StreamKind::LtpInfo),
            key("B", StreamKind::LtpInfo),
        ]);

        let tokens: Vec<_> = registry.entries().iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["C", "A", "B"]);
    }

    #[test]
    fn clear_empties_registry() {
        let mut registry = SubscriptionRegistry::from_keys([key("A", StreamKind::LtpInfo)]);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn key_serializes_with_wire_kind() {
        let json = serde_json::to_string(&key("NSECM:2885", StreamKind::MarketPicture)).unwrap();
        assert_eq!(json, r#"{"token":"NSECM:2885","kind":"marketPicture"}"#);
    }

    fn arb_key() -> impl Strategy<Value = SubscriptionKey> {
        ("[A-C]{1,2}", prop::bool::ANY).prop_map(|(token, depth)| {
            let kind = if depth {
                StreamKind::MarketPicture
            } else {
                StreamKind::LtpInfo
            };
            SubscriptionKey::new(token, kind)
        })
    }

    proptest! {
        #[test]
        fn registry_never_holds_duplicate_pairs(
            ops in prop::collection::vec((arb_key(), prop::bool::ANY), 0..64)
        ) {
            let mut registry = SubscriptionRegistry::new();

            for (key, insert) in ops {
                if insert {
                    registry.add(key);
                } else {
                    registry.remove(&key.token, key.kind);
                }

                let unique: HashSet<_> = registry.entries().iter().collect();
                prop_assert_eq!(unique.len(), registry.len());
            }
        }
    }
}
