mod bootstrap;
mod cors;
mod customers;
mod docs;
mod errors;
mod extract;
mod formatters;
mod health;
mod listener;
mod pipeline;
mod state;

use anyhow::Result;
use northwind_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use northwind_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let router = pipeline::app(app.state);

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        environment = app.config.environment.as_str(),
        "northwind-server started"
    );
    listener::serve(router, &app.config.server).await?;

    app.db_pool.close().await;
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "northwind-server stopped"
    );

    Ok(())
}
