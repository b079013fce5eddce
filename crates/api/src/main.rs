//! Checkout History - Main Entry Point

use history_api::{init_logging, run_server, Settings};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Level was validated while loading settings
    let level = settings.log_level().unwrap_or(tracing::Level::INFO);
    if let Err(e) = init_logging(level, settings.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("=== Checkout History v{} ===", env!("CARGO_PKG_VERSION"));
    match &settings.env_file {
        Some(path) => info!("Loaded environment overrides from {}", path.display()),
        None => info!("No .env file found, using process environment"),
    }

    if let Err(e) = run_server(settings).await {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
