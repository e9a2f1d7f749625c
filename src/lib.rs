pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod startup;
pub mod store;
pub mod telemetry;
