//! Taskboard server binary. See `--help` for flags; every flag can also be
//! set in `~/.config/taskboard/config.toml`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use taskboard_server::config::{ServerCliArgs, ServerConfig};
use taskboard_server::http::{self, AppState};

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServerConfig::load(&ServerCliArgs::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("taskboard-server: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    match &config.source {
        Some(path) => tracing::info!(path = %path.display(), "loaded config file"),
        None => tracing::debug!("no config file, using flags and defaults"),
    }

    let state = Arc::new(AppState::from_config(&config));
    let (addr, handle) = match http::start_server_with_state(&config.bind_addr, state).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        addr = %addr,
        owner = %config.owner_id,
        max_page_size = config.max_page_size,
        max_body_size = config.max_body_size,
        "taskboard server listening"
    );

    match handle.await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server task failed");
            ExitCode::FAILURE
        }
    }
}
