//! Progress Server
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! progress-server
//!
//! # Start with custom config
//! progress-server --config /path/to/config.toml
//!
//! # Start on another port with a custom data directory
//! progress-server --http-port 8080 --data-dir /srv/questline
//! ```
//!
//! See `progress_server::http` for the API.

use clap::Parser;
use progress_server::config::default_data_dir;
use progress_server::services::spawn_logging_listener;
use progress_server::{Config, HttpServer, Services};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "progress-server")]
#[command(about = "Progress, account and classroom backend for the questline game")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (database and config.toml)
    #[arg(long, env = "PROGRESS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("progress_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Explicit --config wins, then config.toml in the data directory
    let default_config = args
        .data_dir
        .clone()
        .unwrap_or_else(default_data_dir)
        .join("config.toml");
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None if default_config.exists() => Config::load(&default_config)?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        units = config.curriculum.unit_count,
        "Starting progress-server"
    );

    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let services = Arc::new(Services::from_config(&config)?);
    let listener = spawn_logging_listener(services.events.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(HttpServer::new(services, http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    listener.abort();
    Ok(())
}
