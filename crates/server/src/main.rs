mod api_error;
mod bootstrap;
mod context;
mod health;
mod refund;
mod state;
mod support;

use std::time::Duration;

use anyhow::Result;
use supportdesk_core::config::{AppConfig, LoadOptions};
use tracing::{error, info, warn};

use crate::state::{app, AppState};

fn init_logging(config: &AppConfig) {
    use supportdesk_core::config::LogFormat::*;
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

    let app_handle = bootstrap::bootstrap_with_config(config).await?;
    let address =
        format!("{}:{}", app_handle.config.server.bind_address, app_handle.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "supportdesk-server listening"
    );

    let router = app(AppState::from_pool(app_handle.db_pool.clone()), app_handle.db_pool.clone());
    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "supportdesk-server stopping"
    );
    let grace = Duration::from_secs(app_handle.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app_handle.db_pool.close()).await.is_err() {
        warn!(
            event_name = "system.server.pool_close_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "database pool did not close within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for ctrl-c"
        );
        std::future::pending::<()>().await;
    }
}
