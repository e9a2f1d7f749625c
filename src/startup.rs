use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::TokenCodec;
use crate::configuration::Settings;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{health_check, issue_token, json_config, refresh_token, whoami};
use crate::service::TokenService;
use crate::store::{InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore};

pub fn run(listener: TcpListener, service: TokenService) -> Result<Server, std::io::Error> {
    let codec = service.codec();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(service.clone())
            .app_data(json_config())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/token", web::post().to(issue_token))
            .route("/auth/refresh", web::post().to(refresh_token))
            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(codec.clone()))
                    .route("/whoami", web::get().to(whoami)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Wire the codec and the configured refresh token store into a service.
///
/// Connects to Postgres and applies pending migrations unless the in-memory
/// store is selected.
pub async fn build_token_service(configuration: &Settings) -> Result<TokenService, sqlx::Error> {
    let codec = Arc::new(TokenCodec::new(&configuration.jwt));

    let store: Arc<dyn RefreshTokenStore> = if configuration.application.in_memory_store {
        tracing::warn!("Using in-memory refresh token store; tokens are lost on restart");
        Arc::new(InMemoryRefreshTokenStore::new())
    } else {
        tracing::info!("Attempting to connect to database");
        let pool = PgPoolOptions::new()
            .max_connections(configuration.database.max_connections)
            .acquire_timeout(configuration.database.acquire_timeout())
            .connect(&configuration.database.connection_string())
            .await?;
        tracing::info!("Database connection pool created successfully");

        sqlx::migrate!("./migrations").run(&pool).await?;
        Arc::new(PgRefreshTokenStore::new(pool))
    };

    Ok(TokenService::new(codec, store))
}
