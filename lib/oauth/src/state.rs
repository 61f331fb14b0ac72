//! In-memory CSRF state store for in-flight authorizations.
//!
//! Each authorization redirect carries an opaque `state` value that must
//! round-trip through the provider. States are single-use and expire after
//! a TTL; expired entries are swept linearly on every mutation, so the map
//! never grows beyond the set of live authorizations plus strays from the
//! last TTL window.

use chrono::{DateTime, Duration, Utc};
use flowdeck_core::ConnectionId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Default state lifetime.
const DEFAULT_TTL_MINUTES: i64 = 10;

/// A pending authorization awaiting its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    /// The connection being authorized.
    pub connection_id: ConnectionId,
    /// The provider key.
    pub provider: String,
    /// PKCE code verifier, when the provider uses PKCE.
    pub pkce_verifier: Option<String>,
    /// When the authorization was started.
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Creates a new pending authorization stamped with the current time.
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        provider: impl Into<String>,
        pkce_verifier: Option<String>,
    ) -> Self {
        Self {
            connection_id,
            provider: provider.into(),
            pkce_verifier,
            created_at: Utc::now(),
        }
    }
}

/// In-memory store of state -> pending authorization.
pub struct AuthStateStore {
    ttl: Duration,
    states: Mutex<HashMap<String, PendingAuthorization>>,
}

impl AuthStateStore {
    /// Creates a store with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    /// Creates a store with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Records a pending authorization under its state value.
    pub fn insert(&self, state: impl Into<String>, pending: PendingAuthorization) {
        let mut states = self.states.lock().expect("state store lock");
        Self::sweep(&mut states, self.ttl);
        states.insert(state.into(), pending);
    }

    /// Takes the pending authorization for a state value.
    ///
    /// States are single-use: a second take of the same value returns
    /// `None`, as does a take after the TTL elapsed.
    pub fn take(&self, state: &str) -> Option<PendingAuthorization> {
        let mut states = self.states.lock().expect("state store lock");
        Self::sweep(&mut states, self.ttl);
        states.remove(state)
    }

    /// Returns the number of live states.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut states = self.states.lock().expect("state store lock");
        Self::sweep(&mut states, self.ttl);
        states.len()
    }

    /// Returns true if no authorizations are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired entries.
    fn sweep(states: &mut HashMap<String, PendingAuthorization>, ttl: Duration) {
        let cutoff = Utc::now() - ttl;
        states.retain(|_, pending| pending.created_at > cutoff);
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_single_use() {
        let store = AuthStateStore::new();
        let pending = PendingAuthorization::new(ConnectionId::new(), "google", None);
        store.insert("state_abc", pending.clone());

        assert_eq!(store.take("state_abc"), Some(pending));
        assert_eq!(store.take("state_abc"), None);
    }

    #[test]
    fn unknown_state_returns_none() {
        let store = AuthStateStore::new();
        assert_eq!(store.take("missing"), None);
    }

    #[test]
    fn expired_states_are_swept() {
        let store = AuthStateStore::with_ttl(Duration::zero());
        store.insert(
            "state_old",
            PendingAuthorization::new(ConnectionId::new(), "google", None),
        );

        // TTL of zero expires entries immediately.
        assert_eq!(store.take("state_old"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_keeps_live_entries() {
        let store = AuthStateStore::with_ttl(Duration::minutes(10));
        store.insert(
            "state_live",
            PendingAuthorization::new(ConnectionId::new(), "slack", Some("verifier".to_string())),
        );
        store.insert(
            "state_other",
            PendingAuthorization::new(ConnectionId::new(), "github", None),
        );

        assert_eq!(store.len(), 2);
        let taken = store.take("state_live").expect("live entry");
        assert_eq!(taken.provider, "slack");
        assert_eq!(taken.pkce_verifier.as_deref(), Some("verifier"));
        assert_eq!(store.len(), 1);
    }
}
