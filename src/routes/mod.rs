mod auth;

use actix_web::HttpResponse;

pub use auth::{
    issue_token, json_config, refresh_token, whoami, RefreshRequest, TokenPairResponse,
    TokenRequest, WhoAmIResponse,
};

/// GET /health_check
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
