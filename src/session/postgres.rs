use super::{Session, SessionStore, SessionStoreError};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;

const SESSION_COLUMNS: &str = "session_id, user_id, credential_hash, expires_at, created_at, \
     last_used_at, origin_address, client_descriptor";

/// Session ledger backed by the `sessions` table.
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        session_id: row.try_get("session_id")?,
        subject_id: row.try_get("user_id")?,
        credential_hash: row.try_get("credential_hash")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
        origin_address: row.try_get("origin_address")?,
        client_descriptor: row.try_get("client_descriptor")?,
    })
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> Result<(), SessionStoreError> {
        let query = r"
            INSERT INTO sessions
                (session_id, user_id, credential_hash, expires_at, created_at, last_used_at,
                 origin_address, client_descriptor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        sqlx::query(query)
            .bind(session.session_id)
            .bind(session.subject_id)
            .bind(&session.credential_hash)
            .bind(session.expires_at)
            .bind(session.created_at)
            .bind(session.last_used_at)
            .bind(session.origin_address.as_deref())
            .bind(session.client_descriptor.as_deref())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|err| SessionStoreError::backend("create", err))?;
        Ok(())
    }

    async fn fetch_live(
        &self,
        credential_hash: &str,
    ) -> Result<Option<Session>, SessionStoreError> {
        // Liveness is decided by the database clock in the same statement that touches the row.
        let query = format!(
            "UPDATE sessions SET last_used_at = NOW() \
             WHERE credential_hash = $1 AND expires_at > NOW() \
             RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(credential_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await
            .map_err(|err| SessionStoreError::backend("fetch_live", err))?;

        row.as_ref()
            .map(session_from_row)
            .transpose()
            .map_err(|err| SessionStoreError::backend("fetch_live", err))
    }

    async fn delete(&self, credential_hash: &str) -> Result<bool, SessionStoreError> {
        let query = "DELETE FROM sessions WHERE credential_hash = $1";
        let result = sqlx::query(query)
            .bind(credential_hash)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(|err| SessionStoreError::backend("delete", err))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_subject(&self, subject_id: i64) -> Result<u64, SessionStoreError> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(subject_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(|err| SessionStoreError::backend("delete_by_subject", err))?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(|err| SessionStoreError::backend("delete_expired", err))?;
        Ok(result.rows_affected())
    }

    async fn list_by_subject(&self, subject_id: i64) -> Result<Vec<Session>, SessionStoreError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND expires_at > NOW() \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(subject_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .map_err(|err| SessionStoreError::backend("list_by_subject", err))?;

        rows.iter()
            .map(session_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SessionStoreError::backend("list_by_subject", err))
    }
}
