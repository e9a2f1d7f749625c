//! Authentication Routes
//!
//! Token issuance, token refresh and inspection of the caller's access token.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::AccessTokenClaims;
use crate::error::{ErrorContext, TokenError};
use crate::service::{TokenPair, TokenService};

/// Token issuance request. Absent fields arrive as empty strings and are
/// rejected by the service.
#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub ip: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub ip: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
    pub ip: String,
    pub expires_at: Option<String>,
}

/// POST /auth/token
///
/// Issue an access/refresh token pair for a user.
///
/// # Errors
/// - 400: `user_id` or `ip` missing or empty
/// - 500: Token generation failed
/// - 503: Refresh token could not be stored
pub async fn issue_token(
    body: web::Json<TokenRequest>,
    service: web::Data<TokenService>,
) -> Result<HttpResponse, TokenError> {
    let context = ErrorContext::new("token_issue").with_user_id(body.user_id.clone());

    let pair = service
        .issue_token_pair(&body.user_id, &body.ip)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(request_id = %context.request_id, "Token pair issued");
    Ok(HttpResponse::Ok().json(TokenPairResponse::from(pair)))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new pair. The presented refresh token is
/// invalidated; presenting it again fails with 401.
///
/// # Errors
/// - 400: `refresh_token` or `ip` missing or empty
/// - 401: Unknown, mismatched or already rotated refresh token
/// - 404: Refresh record vanished during rotation
/// - 500/503: Token generation or storage failure
pub async fn refresh_token(
    body: web::Json<RefreshRequest>,
    service: web::Data<TokenService>,
) -> Result<HttpResponse, TokenError> {
    let context = ErrorContext::new("token_refresh");

    let pair = service
        .refresh_token_pair(&body.refresh_token, &body.ip)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(request_id = %context.request_id, "Token pair refreshed");
    Ok(HttpResponse::Ok().json(TokenPairResponse::from(pair)))
}

/// GET /api/whoami
///
/// Echo the claims of the caller's access token.
/// **Requires valid JWT access token** in the Authorization header; claims
/// are injected by `JwtMiddleware`.
pub async fn whoami(claims: web::ReqData<AccessTokenClaims>) -> HttpResponse {
    let claims = claims.into_inner();

    HttpResponse::Ok().json(WhoAmIResponse {
        expires_at: claims.expires_at_rfc3339(),
        user_id: claims.user_id,
        ip: claims.ip,
    })
}

/// Map unreadable JSON bodies to `MalformedRequest` instead of actix's
/// plain-text 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(4096)
        .error_handler(|err, _req| {
            tracing::warn!(error = %err, "Rejected unreadable JSON body");
            TokenError::MalformedRequest("body").into()
        })
}
