//! Structured logging setup for the contact ingest worker.
//!
//! `LOG_FORMAT=json` renders one JSON object per line to stdout, suitable
//! for CloudWatch Logs Insights and similar log-query backends. Any other
//! value renders a human-readable line to stderr for local development.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration, resolved from [`contact_ingest_protocol::Settings`]
/// at the call site so this crate stays decoupled from the settings type.
pub struct LogConfig<'a> {
    pub level: &'a str,
    pub json: bool,
}

/// Initialize the global tracing subscriber. Call once, at process start.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let filter = EnvFilter::try_new(config.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stdout)
                    .with_filter(filter),
            )
            .try_init()
            .context("failed to install JSON logging subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .try_init()
            .context("failed to install logging subscriber")?;
    }

    Ok(())
}
