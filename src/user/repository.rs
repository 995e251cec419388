//! Handle database requests.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::user::UserRecord;

/// Read access to local user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find non-deleted records for `username`.
    ///
    /// Uniqueness is enforced by the schema, so more than one row means the
    /// store is inconsistent.
    async fn find_active(
        &self,
        username: &str,
    ) -> Result<Vec<UserRecord>, StoreError>;
}

/// PostgreSQL user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new [`PgUserStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_active(
        &self,
        username: &str,
    ) -> Result<Vec<UserRecord>, StoreError> {
        // Two rows are enough to detect a duplicate.
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, password, blocked, created_at, deleted_at
            FROM users
            WHERE username = $1 AND deleted_at IS NULL
            ORDER BY id
            LIMIT 2
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
