//! Farmwatch API Server
//!
//! Run with: cargo run --bin farmwatch
//!
//! # Configuration
//!
//! Settings come from a TOML file (`--config`, or the first of
//! `~/.config/farmwatch/config.toml`, `/etc/farmwatch/config.toml`,
//! `./config.toml`), then `FARMWATCH_*` environment variables, then the
//! command-line flags below.
//!
//! - `FARMWATCH_DB_PATH`: SQLite database file
//! - `FARMWATCH_API_HOST` / `FARMWATCH_API_PORT`: bind address (default: 0.0.0.0:5000)
//! - `FARMWATCH_LOG_LEVEL` / `FARMWATCH_LOG_FORMAT`: logging (`pretty` or `json`)
//! - `RUST_LOG`: overrides the configured log level

use anyhow::Context;
use clap::Parser;
use farmwatch::api::{serve, AppState};
use farmwatch::config::Config;
use farmwatch::logging::init_tracing;
use farmwatch::store::DocumentStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "farmwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Farm weather API: readings history, live feed and farm settings")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(db) = args.db {
        config.store.path = db.to_string_lossy().to_string();
    }

    init_tracing(&config.logging)?;

    tracing::info!("Starting Farmwatch API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.store.path);

    if let Some(parent) = PathBuf::from(&config.store.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let store = Arc::new(
        DocumentStore::open(&config.store.path)
            .with_context(|| format!("opening store at {}", config.store.path))?,
    );
    tracing::info!("Store opened with {} readings", store.reading_count()?);

    let state = AppState::new(store, config.api);
    serve(state).await?;

    Ok(())
}
