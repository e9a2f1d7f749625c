use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{RefreshTokenRecord, RefreshTokenStore, StoreError};
use crate::auth::lookup_digest;

/// Refresh token store backed by the `refresh_tokens` table.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn put(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, lookup_digest, bound_ip, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                lookup_digest = EXCLUDED.lookup_digest,
                bound_ip = EXCLUDED.bound_ip,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.token_hash)
        .bind(&record.lookup_digest)
        .bind(&record.bound_ip)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn lookup(&self, presented_token: &str) -> Result<RefreshTokenRecord, StoreError> {
        let digest = lookup_digest(presented_token);

        let row = sqlx::query_as::<_, (String, String, String, String)>(
            r#"
            SELECT user_id, token_hash, lookup_digest, bound_ip
            FROM refresh_tokens
            WHERE lookup_digest = $1
            "#,
        )
        .bind(&digest)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Err(StoreError::NotFound),
            Some((user_id, token_hash, lookup_digest, bound_ip)) => Ok(RefreshTokenRecord {
                user_id,
                token_hash,
                lookup_digest,
                bound_ip,
            }),
        }
    }

    async fn replace(
        &self,
        expected_digest: &str,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        // Single-statement compare-and-swap; row locking serializes racing rotations
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $1, lookup_digest = $2, bound_ip = $3, updated_at = $4
            WHERE user_id = $5 AND lookup_digest = $6
            "#,
        )
        .bind(&record.token_hash)
        .bind(&record.lookup_digest)
        .bind(&record.bound_ip)
        .bind(Utc::now())
        .bind(&record.user_id)
        .bind(expected_digest)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE user_id = $1)",
        )
        .bind(&record.user_id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Err(StoreError::Conflict)
        } else {
            Err(StoreError::NotFound)
        }
    }
}
