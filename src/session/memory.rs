use super::{Session, SessionStore, SessionStoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process session ledger for tests and single-node development.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, live or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn set_expiry(
        &self,
        credential_hash: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(credential_hash) {
            Some(session) => {
                session.expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.credential_hash) {
            return Err(SessionStoreError::backend(
                "create",
                "duplicate credential hash",
            ));
        }
        sessions.insert(session.credential_hash.clone(), session.clone());
        Ok(())
    }

    async fn fetch_live(
        &self,
        credential_hash: &str,
    ) -> Result<Option<Session>, SessionStoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .get_mut(credential_hash)
            .filter(|session| session.is_live_at(now))
            .map(|session| {
                session.last_used_at = now;
                session.clone()
            }))
    }

    async fn delete(&self, credential_hash: &str) -> Result<bool, SessionStoreError> {
        Ok(self
            .sessions
            .write()
            .await
            .remove(credential_hash)
            .is_some())
    }

    async fn delete_by_subject(&self, subject_id: i64) -> Result<u64, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.subject_id != subject_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_live_at(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn list_by_subject(&self, subject_id: i64) -> Result<Vec<Session>, SessionStoreError> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        let mut live: Vec<Session> = sessions
            .values()
            .filter(|session| session.subject_id == subject_id && session.is_live_at(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Duration;
    use uuid::Uuid;

    fn session(subject_id: i64, hash: &str, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            session_id: Uuid::new_v4(),
            subject_id,
            credential_hash: hash.to_string(),
            expires_at: now + ttl,
            created_at: now,
            last_used_at: now,
            origin_address: Some("192.0.2.10".to_string()),
            client_descriptor: Some("curl/8.0".to_string()),
        }
    }

    #[tokio::test]
    async fn fetch_live_filters_expired_rows() -> Result<()> {
        let store = MemorySessionStore::new();
        store.create(&session(1, "live", Duration::hours(1))).await?;
        store
            .create(&session(1, "dead", Duration::seconds(-1)))
            .await?;

        assert!(store.fetch_live("live").await?.is_some());
        assert!(store.fetch_live("dead").await?.is_none());
        assert!(store.fetch_live("unknown").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn fetch_live_bumps_last_used_at() -> Result<()> {
        let store = MemorySessionStore::new();
        let mut row = session(1, "hash", Duration::hours(1));
        row.last_used_at = row.created_at - Duration::minutes(10);
        store.create(&row).await?;

        let fetched = store.fetch_live("hash").await?;
        assert!(fetched.is_some_and(|s| s.last_used_at > row.last_used_at));
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_duplicate_hash() -> Result<()> {
        let store = MemorySessionStore::new();
        store.create(&session(1, "hash", Duration::hours(1))).await?;
        let err = store.create(&session(2, "hash", Duration::hours(1))).await;
        assert!(err.is_err_and(|e| e.operation() == "create"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<()> {
        let store = MemorySessionStore::new();
        store.create(&session(1, "hash", Duration::hours(1))).await?;
        assert!(store.delete("hash").await?);
        assert!(!store.delete("hash").await?);
        Ok(())
    }

    #[tokio::test]
    async fn bulk_deletes_scope_to_subject_and_expiry() -> Result<()> {
        let store = MemorySessionStore::new();
        store.create(&session(1, "a", Duration::hours(1))).await?;
        store.create(&session(1, "b", Duration::hours(1))).await?;
        store.create(&session(2, "c", Duration::hours(1))).await?;
        store.create(&session(2, "d", Duration::seconds(-5))).await?;

        assert_eq!(store.delete_expired().await?, 1);
        assert_eq!(store.delete_by_subject(1).await?, 2);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.list_by_subject(2).await?.len(), 1);
        assert!(store.list_by_subject(1).await?.is_empty());
        Ok(())
    }
}
