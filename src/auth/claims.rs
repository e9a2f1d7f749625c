//! Access token claims

use serde::{Deserialize, Serialize};

/// Payload of an access token: who it was issued to, from where, and until when.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub user_id: String,
    /// IP address the token was issued to
    pub ip: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn new(user_id: &str, ip: &str, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            ip: ip.to_string(),
            exp: issued_at + ttl_seconds,
        }
    }

    /// A token stops being valid at the exact second of `exp`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    pub fn expires_at_rfc3339(&self) -> Option<String> {
        chrono::DateTime::<chrono::Utc>::from_timestamp(self.exp, 0).map(|dt| dt.to_rfc3339())
    }
}
