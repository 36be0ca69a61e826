//! Tracing setup shared by the binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }
    Ok(())
}
