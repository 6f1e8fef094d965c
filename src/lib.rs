pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::infrastructure::bootstrap;
use crate::infrastructure::config::AppConfig;

pub async fn run() -> std::io::Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = AppConfig::load().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let state = bootstrap::setup(config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize backend");
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    interfaces::http::add_log(
        &state.logs,
        "INFO",
        "System",
        &format!(
            "Backend initialized, serving on {}:{}",
            state.config.host, state.config.port
        ),
    );
    info!("Backend initialized");

    interfaces::http::start_server(state)?.await
}
