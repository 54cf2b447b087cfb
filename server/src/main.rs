use bus_server::api::{self, AppState};
use bus_server::config::Config;
use bus_server::db;
use bus_server::providers::bus_api::BusApiClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "BUS_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bus_server=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;
    info!(path = %config_path, config = ?config, "Loaded configuration");

    let pool = db::connect(&config.database_url).await?;
    let bus_api = BusApiClient::new(
        config.upstream_base_url.as_str(),
        config.service_key.as_str(),
        config.upstream_timeout(),
    )?;

    let state = AppState::new(pool.clone(), bus_api, config.sync_max_pages);
    let app = api::app(state, config.cors_layer()?);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Starting bus stop server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
