mod bootstrap;
mod health;

use anyhow::Result;
use voicedesk_core::config::{AppConfig, LoadOptions};

use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use voicedesk_core::config::LogFormat::*;

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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        cache_backend = ?app.config.cache.backend,
        "voicedesk-server started"
    );
    health::serve(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState::new(app.db_pool.clone(), app.default_agent.clone()),
    )
    .await?;

    app.db_pool.close().await;
    Ok(())
}
