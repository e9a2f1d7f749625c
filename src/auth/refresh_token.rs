//! Refresh Token Secrets
//!
//! A refresh token is an opaque random secret. The client keeps the
//! plaintext; the server keeps two derived values:
//! - a salted bcrypt hash, used to verify the presented secret
//! - a deterministic SHA-256 digest, used only to find the row to verify against

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::TokenError;

/// Freshly minted refresh secret and the values stored for it.
pub struct RefreshSecret {
    /// Returned to the client, never persisted
    pub plaintext: String,
    pub token_hash: String,
    pub lookup_digest: String,
}

/// Draw `byte_len` bytes from the OS random source and encode them URL-safe.
pub fn generate_secret(byte_len: usize) -> Result<String, TokenError> {
    let mut bytes = vec![0u8; byte_len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::RandomSourceFailure(e.to_string()))?;
    Ok(URL_SAFE.encode(&bytes))
}

/// Salted one-way hash for storage.
pub fn hash_secret(secret: &str, cost: u32) -> Result<String, TokenError> {
    bcrypt::hash(secret, cost).map_err(|e| TokenError::RandomSourceFailure(e.to_string()))
}

/// Check a presented secret against its stored bcrypt hash.
///
/// A stored hash that bcrypt cannot parse counts as a mismatch.
pub fn verify_refresh_secret(presented: &str, token_hash: &str) -> bool {
    match bcrypt::verify(presented, token_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "Stored refresh token hash is unreadable");
            false
        }
    }
}

/// Deterministic digest used to index refresh tokens.
pub fn lookup_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
