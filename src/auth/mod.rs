//! Token codec
//!
//! Access token signing/validation and refresh secret generation, hashing
//! and verification.

mod claims;
mod codec;
mod refresh_token;

pub use claims::AccessTokenClaims;
pub use codec::TokenCodec;
pub use refresh_token::lookup_digest;
pub use refresh_token::verify_refresh_secret;
pub use refresh_token::RefreshSecret;
