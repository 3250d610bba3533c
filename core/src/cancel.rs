//! Registry of abort signals keyed by caller-chosen cancellation keys.
//!
//! # Design
//! The registry owns one `CancellationToken` per live key; callers only
//! hold keys. `resolve` attaches to an existing signal or creates one,
//! `abort` cancels and forgets it, `release` forgets it without cancelling
//! (called by the executor once a request settles).
//!
//! Each registration carries an id. A key can be aborted and reused while
//! the aborted call is still unwinding, so `release` only removes the entry
//! whose id it was handed.

use std::fmt;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque key identifying an abortable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CancelKey {
    /// A unique key that cannot collide with any other, see [`CancelKey::unique`].
    Unique(Uuid),
    Name(String),
    Number(i64),
}

impl CancelKey {
    pub fn unique() -> Self {
        CancelKey::Unique(Uuid::new_v4())
    }
}

impl fmt::Display for CancelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelKey::Unique(id) => write!(f, "unique:{id}"),
            CancelKey::Name(name) => write!(f, "{name}"),
            CancelKey::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for CancelKey {
    fn from(name: &str) -> Self {
        CancelKey::Name(name.to_string())
    }
}

impl From<String> for CancelKey {
    fn from(name: String) -> Self {
        CancelKey::Name(name)
    }
}

impl From<i64> for CancelKey {
    fn from(n: i64) -> Self {
        CancelKey::Number(n)
    }
}

/// A live registration: the signal plus the id `release` matches on.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: Uuid,
    pub token: CancellationToken,
}

impl Registration {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    entries: DashMap<CancelKey, Registration>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live registration for `key`, creating one if none exists.
    pub fn resolve(&self, key: &CancelKey) -> Registration {
        self.entries
            .entry(key.clone())
            .or_insert_with(Registration::new)
            .clone()
    }

    /// Cancel and forget the signal for `key`. No-op if nothing is registered.
    pub fn abort(&self, key: &CancelKey) {
        if let Some((_, registration)) = self.entries.remove(key) {
            registration.token.cancel();
        }
    }

    /// Forget the registration `id` under `key` without cancelling it. A
    /// newer registration for the same key is left alone.
    pub fn release(&self, key: &CancelKey, id: Uuid) {
        self.entries.remove_if(key, |_, registration| registration.id == id);
    }

    pub fn contains(&self, key: &CancelKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_twice_returns_same_signal() {
        let registry = CancellationRegistry::new();
        let key = CancelKey::from("T");
        let first = registry.resolve(&key);
        let second = registry.resolve(&key);
        assert_eq!(first.id, second.id);
        first.token.cancel();
        assert!(second.token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn abort_cancels_and_removes() {
        let registry = CancellationRegistry::new();
        let key = CancelKey::from(7i64);
        let signal = registry.resolve(&key).token;
        registry.abort(&key);
        assert!(signal.is_cancelled());
        assert!(!registry.contains(&key));
    }

    #[test]
    fn abort_unknown_key_is_noop() {
        let registry = CancellationRegistry::new();
        registry.abort(&CancelKey::from("missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn released_key_gets_fresh_signal() {
        let registry = CancellationRegistry::new();
        let key = CancelKey::from("T");
        let first = registry.resolve(&key);
        registry.release(&key, first.id);
        registry.abort(&key);
        assert!(!first.token.is_cancelled());

        let second = registry.resolve(&key);
        assert!(!second.token.is_cancelled());
        first.token.cancel();
        assert!(!second.token.is_cancelled());
    }

    #[test]
    fn stale_release_keeps_newer_registration() {
        let registry = CancellationRegistry::new();
        let key = CancelKey::from("T");
        let first = registry.resolve(&key);
        registry.abort(&key);

        let second = registry.resolve(&key);
        assert_ne!(first.id, second.id);
        registry.release(&key, first.id);
        assert!(registry.contains(&key));

        registry.abort(&key);
        assert!(second.token.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn unique_keys_never_collide() {
        assert_ne!(CancelKey::unique(), CancelKey::unique());
    }
}
