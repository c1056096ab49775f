use super::{NewUser, User, UserCounts, UserStore, UserStoreError};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;

const USER_COLUMNS: &str = "id, username, email, password_hash, domain, subject, is_admin, \
     is_active, created_at, last_login";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        operation: &'static str,
        predicate: &str,
        bind: impl for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
    ) -> Result<Option<User>, UserStoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
        let row = sqlx::query(&query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .map_err(|err| UserStoreError::backend(operation, err))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|err| UserStoreError::backend(operation, err))
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

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        domain: row.try_get("domain")?,
        subject: row.try_get("subject")?,
        is_admin: row.try_get("is_admin")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        last_login: row.try_get("last_login")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &NewUser) -> Result<User, UserStoreError> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, domain, subject, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.domain)
            .bind(&user.subject)
            .bind(user.is_admin)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    UserStoreError::Conflict
                } else {
                    UserStoreError::backend("create", err)
                }
            })?;

        user_from_row(&row).map_err(|err| UserStoreError::backend("create", err))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        self.find_one("find_by_username", "username = $1", username.to_string())
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        self.find_one("find_by_email", "LOWER(email) = LOWER($1)", email.to_string())
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError> {
        self.find_one("find_by_id", "id = $1", id).await
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), UserStoreError> {
        let query = "UPDATE users SET last_login = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(|err| UserStoreError::backend("touch_last_login", err))?;
        Ok(())
    }

    async fn counts(&self) -> Result<UserCounts, UserStoreError> {
        let query = r"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE is_active) AS active,
                COUNT(*) FILTER (WHERE is_admin) AS admins
            FROM users
        ";
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(|err| UserStoreError::backend("counts", err))?;

        let decode = || -> Result<UserCounts, sqlx::Error> {
            Ok(UserCounts {
                total: row.try_get("total")?,
                active: row.try_get("active")?,
                admins: row.try_get("admins")?,
            })
        };
        decode().map_err(|err| UserStoreError::backend("counts", err))
    }
}
