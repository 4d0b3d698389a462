pub mod api;
pub mod config;
pub mod pipeline;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Serve the prescription API until Ctrl-C.
pub async fn run() -> Result<(), api::ServerError> {
    // .env values become defaults for the clap `env` lookups below
    dotenvy::dotenv().ok();
    let service_config = config::ServiceConfig::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let mut server = api::start_server(&service_config).await?;
    tracing::info!(addr = %server.addr(), "Listening for prescription uploads");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }

    server.shutdown();
    server.wait().await;
    Ok(())
}
