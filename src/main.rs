use std::net::TcpListener;
use tokenkeeper::configuration::get_configuration;
use tokenkeeper::startup::{build_token_service, run};
use tokenkeeper::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let service = build_token_service(&configuration).await.map_err(|e| {
        tracing::error!("Failed to initialise refresh token store: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Database connection error",
        )
    })?;

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, service)?.await
}
