//! Integration tests for the health endpoint

use std::net::TcpListener;
use std::sync::Arc;
use tokenkeeper::auth::TokenCodec;
use tokenkeeper::configuration::JwtSettings;
use tokenkeeper::service::TokenService;
use tokenkeeper::startup::run;
use tokenkeeper::store::InMemoryRefreshTokenStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let codec = TokenCodec::new(&JwtSettings {
        secret: "health-check-secret-key-at-least-32-chars".to_string(),
        access_token_ttl_seconds: 900,
        refresh_secret_bytes: 32,
        refresh_hash_cost: 4,
    });
    let service = TokenService::new(
        Arc::new(codec),
        Arc::new(InMemoryRefreshTokenStore::new()),
    );
    let server = run(listener, service).expect("Failed to create server");

    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/main", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn token_endpoint_rejects_get() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/auth/token", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_client_error());
}
