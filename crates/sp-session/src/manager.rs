//! Session state management.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{SessionError, SessionResult};
use crate::record::SessionRecord;
use crate::scope::SessionScope;

/// Storage of session records keyed by [`SessionScope`].
///
/// Implementations may keep records in memory or in a shared cache. Absence
/// is never an error: `get` returns `None` and `clear` returns `false`.
#[async_trait]
pub trait SessionStateManager: Send + Sync {
    /// Stores `record` for `scope`, replacing any previous record.
    async fn create(&self, scope: &SessionScope, record: SessionRecord) -> SessionResult<()>;

    /// Returns the record for `scope`, if any.
    async fn get(&self, scope: &SessionScope) -> SessionResult<Option<SessionRecord>>;

    /// Removes the record for `scope`. Returns whether one existed.
    async fn clear(&self, scope: &SessionScope) -> SessionResult<bool>;
}

#[derive(Debug)]
struct Entry {
    record: SessionRecord,
    last_access: Instant,
}

/// In-process session storage with an optional idle timeout.
#[derive(Debug, Default)]
pub struct InMemorySessionManager {
    sessions: RwLock<HashMap<SessionScope, Entry>>,
    idle_ttl: Option<Duration>,
}

impl InMemorySessionManager {
    /// Creates a manager whose sessions never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expires sessions left idle for `ttl`.
    #[must_use]
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Returns the number of stored sessions, including expired ones not
    /// yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drops every expired session. Returns how many were removed.
    ///
    /// Runs on every `create`, so abandoned sessions do not accumulate.
    pub fn purge_expired(&self) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_access.elapsed() < ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged idle sessions");
        }
        removed
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.idle_ttl
            .is_some_and(|ttl| entry.last_access.elapsed() >= ttl)
    }
}

#[async_trait]
impl SessionStateManager for InMemorySessionManager {
    async fn create(&self, scope: &SessionScope, record: SessionRecord) -> SessionResult<()> {
        if !record.is_consistent() {
            return Err(SessionError::Invalid(
                "authenticated session without a name identifier".to_string(),
            ));
        }

        self.purge_expired();

        let replaced = self
            .sessions
            .write()
            .insert(
                scope.clone(),
                Entry {
                    record,
                    last_access: Instant::now(),
                },
            )
            .is_some();

        tracing::debug!(scope = %scope, replaced, "Session created");
        Ok(())
    }

    async fn get(&self, scope: &SessionScope) -> SessionResult<Option<SessionRecord>> {
        let mut sessions = self.sessions.write();

        let expired = match sessions.get(scope) {
            None => return Ok(None),
            Some(entry) => self.is_expired(entry),
        };
        if expired {
            sessions.remove(scope);
            tracing::debug!(scope = %scope, "Session expired");
            return Ok(None);
        }

        Ok(sessions.get_mut(scope).map(|entry| {
            entry.last_access = Instant::now();
            entry.record.clone()
        }))
    }

    async fn clear(&self, scope: &SessionScope) -> SessionResult<bool> {
        let existed = self.sessions.write().remove(scope).is_some();
        tracing::debug!(scope = %scope, existed, "Session cleared");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NormalizedAttributes, ValidationMode};

    fn record(name_id: &str) -> SessionRecord {
        SessionRecord::new(name_id, NormalizedAttributes::new(), ValidationMode::Strict)
    }

    #[tokio::test]
    async fn create_get_clear() {
        let manager = InMemorySessionManager::new();
        let scope = SessionScope::generate();

        manager.create(&scope, record("alice")).await.unwrap();
        let found = manager.get(&scope).await.unwrap().unwrap();
        assert_eq!(found.name_id, "alice");

        assert!(manager.clear(&scope).await.unwrap());
        assert!(manager.get(&scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let manager = InMemorySessionManager::new();
        let scope = SessionScope::generate();

        assert!(!manager.clear(&scope).await.unwrap());
        manager.create(&scope, record("alice")).await.unwrap();
        assert!(manager.clear(&scope).await.unwrap());
        assert!(!manager.clear(&scope).await.unwrap());
    }

    #[tokio::test]
    async fn create_overwrites() {
        let manager = InMemorySessionManager::new();
        let scope = SessionScope::generate();

        manager.create(&scope, record("alice")).await.unwrap();
        manager.create(&scope, record("bob")).await.unwrap();
        assert_eq!(manager.get(&scope).await.unwrap().unwrap().name_id, "bob");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let manager = InMemorySessionManager::new();
        let a = SessionScope::generate();
        let b = SessionScope::generate();

        manager.create(&a, record("alice")).await.unwrap();
        assert!(manager.get(&b).await.unwrap().is_none());
        assert!(!manager.clear(&b).await.unwrap());
        assert!(manager.get(&a).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rejects_authenticated_record_without_subject() {
        let manager = InMemorySessionManager::new();
        let err = manager
            .create(&SessionScope::generate(), record(""))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let manager = InMemorySessionManager::new().with_idle_ttl(Duration::ZERO);
        let scope = SessionScope::generate();

        manager.create(&scope, record("alice")).await.unwrap();
        assert!(manager.get(&scope).await.unwrap().is_none());
        assert!(manager.is_empty());

        manager.create(&scope, record("alice")).await.unwrap();
        assert_eq!(manager.purge_expired(), 1);
    }

    #[tokio::test]
    async fn create_drops_abandoned_sessions() {
        let manager = InMemorySessionManager::new().with_idle_ttl(Duration::ZERO);

        for _ in 0..1000 {
            manager
                .create(&SessionScope::generate(), record("alice"))
                .await
                .unwrap();
        }
        assert_eq!(manager.len(), 1);

        let long_lived = InMemorySessionManager::new().with_idle_ttl(Duration::from_secs(3600));
        for _ in 0..10 {
            long_lived
                .create(&SessionScope::generate(), record("bob"))
                .await
                .unwrap();
        }
        assert_eq!(long_lived.len(), 10);
    }
}
