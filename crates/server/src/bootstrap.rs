use std::sync::Arc;

use northwind_core::config::AppConfig;
use northwind_db::{connect_with_settings, migrations, DbPool, SqlCustomerRepository};
use thiserror::Error;
use tracing::info;

use crate::docs::DocsError;
use crate::formatters;
use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("api documentation could not be built: {0}")]
    Docs(#[from] DocsError),
    #[error(
        "server.tls must be configured in the {0} environment; plain HTTP is only served in development"
    )]
    TlsRequired(&'static str),
}

/// HTTPS with a redirecting HTTP listener is mandatory outside development.
pub fn ensure_transport(config: &AppConfig) -> Result<(), BootstrapError> {
    if config.server.tls.is_none() && !config.environment.is_development() {
        return Err(BootstrapError::TlsRequired(config.environment.as_str()));
    }
    Ok(())
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = config.environment.as_str(),
        "starting application bootstrap"
    );
    ensure_transport(&config)?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    formatters::log_registered(config.formatters.preferred_xml);

    let repository = Arc::new(SqlCustomerRepository::new(db_pool.clone()));
    let state = AppState::new(config.clone(), repository)?.with_db_pool(db_pool.clone());
    info!(
        event_name = "system.bootstrap.docs_published",
        correlation_id = "bootstrap",
        path = %state.docs.json_path,
        "api documentation published"
    );

    Ok(Application { config, db_pool, state })
}
