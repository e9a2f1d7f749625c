//! Refresh Token Store
//!
//! Persists one refresh token record per user. Only hashes and digests are
//! stored; the plaintext secret never reaches this layer except as the
//! presented value in `lookup`.

mod memory;
mod postgres;

use async_trait::async_trait;

pub use memory::InMemoryRefreshTokenStore;
pub use postgres::PgRefreshTokenStore;

/// The single live refresh credential of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: String,
    /// bcrypt hash of the refresh secret
    pub token_hash: String,
    /// SHA-256 digest of the refresh secret, unique across records
    pub lookup_digest: String,
    pub bound_ip: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("refresh token record not found")]
    NotFound,
    /// The record was rotated by someone else between lookup and replace
    #[error("refresh token record was replaced concurrently")]
    Conflict,
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Storage(other.to_string()),
        }
    }
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store the record for `record.user_id`, replacing any session the user
    /// already had.
    async fn put(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    /// Find the record belonging to a presented plaintext refresh token.
    async fn lookup(&self, presented_token: &str) -> Result<RefreshTokenRecord, StoreError>;

    /// Atomically overwrite the record of `record.user_id`, but only while its
    /// current digest is still `expected_digest`.
    ///
    /// Returns `NotFound` when the user has no record and `Conflict` when the
    /// record holds a different digest.
    async fn replace(
        &self,
        expected_digest: &str,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError>;
}
