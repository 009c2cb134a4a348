use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::process::ExitCode;
use std::sync::Arc;

use share_docs::auth::{CredentialVerifier, TokenAuthority};
use share_docs::configuration::get_configuration;
use share_docs::startup::run;
use share_docs::telemetry::init_telemetry;
use share_docs::users::PgUserStore;

#[tokio::main]
async fn main() -> ExitCode {
    init_telemetry();

    tracing::info!("Starting application");

    // Missing or invalid secrets are fatal
    let configuration = match get_configuration() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read configuration");
            return ExitCode::FAILURE;
        }
    };

    let authority = match TokenAuthority::new(&configuration.jwt) {
        Ok(authority) => authority,
        Err(e) => {
            tracing::error!(error = %e, "Invalid token configuration");
            return ExitCode::FAILURE;
        }
    };

    let verifier = match CredentialVerifier::from_settings(&configuration.password) {
        Ok(verifier) => verifier,
        Err(e) => {
            tracing::error!(error = %e, "Invalid password configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create connection pool");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!(error = %e, "Failed to run database migrations");
        return ExitCode::FAILURE;
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = match TcpListener::bind(&address) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %address, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(address = %address, "Server listening");

    let server = match run(listener, Arc::new(PgUserStore::new(pool)), authority, verifier) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.await {
        tracing::error!(error = %e, "Server terminated with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
