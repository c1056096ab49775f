use super::{Jrd, Link, ResourceKey, ResourceStore, SEARCH_LIMIT, StoreError};
use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Row};
use std::collections::BTreeMap;
use tracing::Instrument;

/// Reads resource records from the JRD columns of the `users` table.
#[derive(Clone, Debug)]
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
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

// `_` is legal in usernames, so LIKE wildcards in the query must be literal.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for ch in query.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn lookup(&self, key: &ResourceKey) -> Result<Option<Jrd>, StoreError> {
        let query = r"
            SELECT subject, aliases, properties, links
            FROM users
            WHERE LOWER(subject) = LOWER($1) AND is_active
        ";
        let row = sqlx::query(query)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(|err| StoreError::backend("lookup", err))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = || -> Result<Jrd, sqlx::Error> {
            let Json(properties): Json<BTreeMap<String, serde_json::Value>> =
                row.try_get("properties")?;
            let Json(links): Json<Vec<Link>> = row.try_get("links")?;
            Ok(Jrd {
                subject: row.try_get("subject")?,
                aliases: row.try_get("aliases")?,
                properties,
                links,
            })
        };

        decode()
            .map(Some)
            .map_err(|err| StoreError::backend("lookup", err))
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, StoreError> {
        let statement = r"
            SELECT subject
            FROM users
            WHERE is_active AND LOWER(subject) LIKE '%' || $1 || '%'
            ORDER BY subject
            LIMIT $2
        ";
        // SEARCH_LIMIT is a small constant
        #[allow(clippy::cast_possible_wrap)]
        let limit = SEARCH_LIMIT as i64;
        sqlx::query_scalar::<_, String>(statement)
            .bind(escape_like(&query.to_lowercase()))
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", statement))
            .await
            .map_err(|err| StoreError::backend("search", err))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(|err| StoreError::backend("ping", err))?;
        Ok(())
    }
}
