//! Token Service
//!
//! Orchestrates issuance and rotation of access/refresh token pairs.
//!
//! Per user the lifecycle is `Unauthenticated -> Issued -> Rotated -> Rotated ...`.
//! Rotation replaces the stored refresh record in place, so a refresh token
//! can be exchanged exactly once.

use std::sync::Arc;

use crate::auth::{verify_refresh_secret, AccessTokenClaims, TokenCodec};
use crate::error::TokenError;
use crate::store::{RefreshTokenRecord, RefreshTokenStore, StoreError};

/// Access token plus the plaintext refresh token handed to the client.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    codec: Arc<TokenCodec>,
    store: Arc<dyn RefreshTokenStore>,
}

impl TokenService {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> Arc<TokenCodec> {
        self.codec.clone()
    }

    /// Issue a fresh pair for `user_id` connecting from `ip`.
    ///
    /// # Errors
    /// - `MalformedRequest` if either argument is empty
    /// - `SigningFailure`, `RandomSourceFailure` from the codec
    /// - `StorageFailure` if the refresh record cannot be written
    #[tracing::instrument(name = "issue_token_pair", skip_all, fields(user_id = %user_id))]
    pub async fn issue_token_pair(&self, user_id: &str, ip: &str) -> Result<TokenPair, TokenError> {
        let user_id = require("user_id", user_id)?;
        let ip = require("ip", ip)?;

        let access_token = self.codec.create_access_token(user_id, ip)?;
        let secret = self.codec.create_refresh_secret()?;

        self.store
            .put(RefreshTokenRecord {
                user_id: user_id.to_string(),
                token_hash: secret.token_hash,
                lookup_digest: secret.lookup_digest,
                bound_ip: ip.to_string(),
            })
            .await
            .map_err(|e| TokenError::StorageFailure(e.to_string()))?;

        tracing::info!("Token pair issued");

        Ok(TokenPair {
            access_token,
            refresh_token: secret.plaintext,
        })
    }

    /// Exchange a refresh token for a new pair, invalidating the old one.
    ///
    /// An IP different from the one the token was bound to is logged as a
    /// security warning but does not block the rotation.
    ///
    /// # Errors
    /// - `MalformedRequest` if either argument is empty
    /// - `InvalidToken` if the token is unknown, does not match its hash, or
    ///   was rotated by a concurrent request
    /// - `NotFound` if the user's record disappeared before the replace
    /// - `SigningFailure`, `RandomSourceFailure`, `StorageFailure`
    #[tracing::instrument(name = "refresh_token_pair", skip_all)]
    pub async fn refresh_token_pair(
        &self,
        refresh_token: &str,
        ip: &str,
    ) -> Result<TokenPair, TokenError> {
        let refresh_token = require("refresh_token", refresh_token)?;
        let ip = require("ip", ip)?;

        let record = match self.store.lookup(refresh_token).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                tracing::warn!("Refresh token not found");
                return Err(TokenError::InvalidToken);
            }
            Err(e) => return Err(TokenError::StorageFailure(e.to_string())),
        };

        if !verify_refresh_secret(refresh_token, &record.token_hash) {
            tracing::warn!(user_id = %record.user_id, "Refresh token does not match stored hash");
            return Err(TokenError::InvalidToken);
        }

        if record.bound_ip != ip {
            tracing::warn!(
                user_id = %record.user_id,
                previous_ip = %record.bound_ip,
                current_ip = %ip,
                "IP address changed since the refresh token was issued"
            );
        }

        let access_token = self.codec.create_access_token(&record.user_id, ip)?;
        let secret = self.codec.create_refresh_secret()?;

        self.store
            .replace(
                &record.lookup_digest,
                RefreshTokenRecord {
                    user_id: record.user_id.clone(),
                    token_hash: secret.token_hash,
                    lookup_digest: secret.lookup_digest,
                    bound_ip: ip.to_string(),
                },
            )
            .await
            .map_err(|e| match e {
                StoreError::Conflict => {
                    tracing::warn!(user_id = %record.user_id, "Refresh token was already rotated");
                    TokenError::InvalidToken
                }
                StoreError::NotFound => TokenError::NotFound,
                StoreError::Storage(msg) => TokenError::StorageFailure(msg),
            })?;

        tracing::info!(user_id = %record.user_id, "Token pair rotated");

        Ok(TokenPair {
            access_token,
            refresh_token: secret.plaintext,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.codec.verify_access_token(token)
    }
}

fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, TokenError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TokenError::MalformedRequest(field));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::store::InMemoryRefreshTokenStore;
    use std::io::Write;
    use std::sync::Mutex;

    fn test_service() -> (TokenService, Arc<InMemoryRefreshTokenStore>) {
        let codec = TokenCodec::new(&JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_ttl_seconds: 900,
            refresh_secret_bytes: 32,
            refresh_hash_cost: 4,
        });
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        (TokenService::new(Arc::new(codec), store.clone()), store)
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_issue_then_refresh() {
        let (service, _) = test_service();

        let issued = service.issue_token_pair("42", "10.0.0.1").await.unwrap();
        let refreshed = service
            .refresh_token_pair(&issued.refresh_token, "10.0.0.1")
            .await
            .expect("Refresh should succeed");

        assert_ne!(issued.refresh_token, refreshed.refresh_token);
        let claims = service.verify_access_token(&refreshed.access_token).unwrap();
        assert_eq!(claims.user_id, "42");
    }

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let (service, _) = test_service();

        let issued = service.issue_token_pair("42", "10.0.0.1").await.unwrap();
        service
            .refresh_token_pair(&issued.refresh_token, "10.0.0.1")
            .await
            .unwrap();

        let second = service
            .refresh_token_pair(&issued.refresh_token, "10.0.0.1")
            .await;
        assert!(matches!(second, Err(TokenError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_store_never_holds_plaintext() {
        let (service, store) = test_service();

        let issued = service.issue_token_pair("42", "10.0.0.1").await.unwrap();
        let record = store.get("42").unwrap();

        assert_ne!(record.token_hash, issued.refresh_token);
        assert_ne!(record.lookup_digest, issued.refresh_token);
        assert_eq!(record.bound_ip, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_ip_change_warns_but_rotates() {
        let (service, store) = test_service();
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let issued = service.issue_token_pair("42", "10.0.0.1").await.unwrap();
        let refreshed = service
            .refresh_token_pair(&issued.refresh_token, "10.0.0.2")
            .await
            .expect("IP change must not block rotation");

        let claims = service.verify_access_token(&refreshed.access_token).unwrap();
        assert_eq!(claims.ip, "10.0.0.2");
        assert_eq!(store.get("42").unwrap().bound_ip, "10.0.0.2");
        assert!(logs
            .contents()
            .contains("IP address changed since the refresh token was issued"));
    }

    #[tokio::test]
    async fn test_missing_fields_are_malformed() {
        let (service, _) = test_service();

        assert!(matches!(
            service.issue_token_pair("", "10.0.0.1").await,
            Err(TokenError::MalformedRequest("user_id"))
        ));
        assert!(matches!(
            service.issue_token_pair("42", "   ").await,
            Err(TokenError::MalformedRequest("ip"))
        ));
        assert!(matches!(
            service.refresh_token_pair("", "10.0.0.1").await,
            Err(TokenError::MalformedRequest("refresh_token"))
        ));
    }

    #[tokio::test]
    async fn test_unknown_refresh_token() {
        let (service, _) = test_service();
        service.issue_token_pair("42", "10.0.0.1").await.unwrap();

        let result = service
            .refresh_token_pair("not-a-real-token", "10.0.0.1")
            .await;
        assert!(matches!(result, Err(TokenError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_invalid() {
        let (service, store) = test_service();
        let issued = service.issue_token_pair("42", "10.0.0.1").await.unwrap();

        // Digest still matches but the stored hash belongs to another secret
        let mut record = store.get("42").unwrap();
        record.token_hash = bcrypt::hash("some-other-secret", 4).unwrap();
        store.put(record).await.unwrap();

        let result = service
            .refresh_token_pair(&issued.refresh_token, "10.0.0.1")
            .await;
        assert!(matches!(result, Err(TokenError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_reissue_replaces_session() {
        let (service, _) = test_service();

        let first = service.issue_token_pair("42", "10.0.0.1").await.unwrap();
        let second = service.issue_token_pair("42", "10.0.0.1").await.unwrap();

        assert!(matches!(
            service.refresh_token_pair(&first.refresh_token, "10.0.0.1").await,
            Err(TokenError::InvalidToken)
        ));
        assert!(service
            .refresh_token_pair(&second.refresh_token, "10.0.0.1")
            .await
            .is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_refresh_single_winner() {
        let (service, _) = test_service();
        let issued = service.issue_token_pair("42", "10.0.0.1").await.unwrap();

        let first = {
            let service = service.clone();
            let token = issued.refresh_token.clone();
            tokio::spawn(async move { service.refresh_token_pair(&token, "10.0.0.1").await })
        };
        let second = {
            let service = service.clone();
            let token = issued.refresh_token.clone();
            tokio::spawn(async move { service.refresh_token_pair(&token, "10.0.0.1").await })
        };

        let results = vec![first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();

        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(TokenError::InvalidToken))));
    }
}
