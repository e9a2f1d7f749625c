//! Token Codec
//!
//! Owns the signing key and the refresh secret parameters. Built once at
//! startup from `JwtSettings` and shared read-only between workers.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::AccessTokenClaims;
use crate::auth::refresh_token::{generate_secret, hash_secret, lookup_digest, RefreshSecret};
use crate::configuration::JwtSettings;
use crate::error::TokenError;

const ALGORITHM: Algorithm = Algorithm::HS512;

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: i64,
    refresh_secret_bytes: usize,
    refresh_hash_cost: u32,
}

impl TokenCodec {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            access_token_ttl: settings.access_token_ttl_seconds,
            refresh_secret_bytes: settings.refresh_secret_bytes,
            refresh_hash_cost: settings.refresh_hash_cost,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl(&self) -> i64 {
        self.access_token_ttl
    }

    /// Sign an access token for `user_id` bound to `ip`, valid from now.
    ///
    /// # Errors
    /// Returns `SigningFailure` if the token cannot be encoded
    pub fn create_access_token(&self, user_id: &str, ip: &str) -> Result<String, TokenError> {
        self.create_access_token_at(user_id, ip, chrono::Utc::now().timestamp())
    }

    pub fn create_access_token_at(
        &self,
        user_id: &str,
        ip: &str,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let claims = AccessTokenClaims::new(user_id, ip, issued_at, self.access_token_ttl);

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::SigningFailure(e.to_string()))
    }

    /// Validate an access token and return its claims.
    ///
    /// # Errors
    /// - `InvalidSignature` if the token is malformed, tampered with or signed
    ///   with another key or algorithm
    /// - `Expired` once the current time reaches `exp`
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.verify_access_token_at(token, chrono::Utc::now().timestamp())
    }

    pub fn verify_access_token_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked below against the caller's clock, without leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                TokenError::InvalidSignature
            })?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Mint a new refresh secret together with its stored hash and digest.
    ///
    /// # Errors
    /// Returns `RandomSourceFailure` if the OS random source cannot be read
    pub fn create_refresh_secret(&self) -> Result<RefreshSecret, TokenError> {
        let plaintext = generate_secret(self.refresh_secret_bytes)?;
        let token_hash = hash_secret(&plaintext, self.refresh_hash_cost)?;
        let lookup_digest = lookup_digest(&plaintext);

        Ok(RefreshSecret {
            plaintext,
            token_hash,
            lookup_digest,
        })
    }
}
