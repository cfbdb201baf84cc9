//! # Structured Logging Module
//!
//! Console logging through the tracing ecosystem, in either a human-readable
//! or a JSON layout. `RUST_LOG` takes precedence over the configured level.

use crate::config::{LogFormat, RouterConfig};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging from router configuration
///
/// Safe to call more than once, and safe to call when the embedding host has
/// already installed a global subscriber.
pub fn init_structured_logging(config: &RouterConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = build_filter(&config.log_level);

        let fmt_layer = match config.log_format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .boxed(),
        };

        let result = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init();

        if result.is_err() {
            // A global subscriber is already set by the host
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            log_level = %config.log_level,
            log_format = ?config.log_format,
            "Structured logging initialized"
        );
    });
}

fn build_filter(configured_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured_level))
        .unwrap_or_else(|_| EnvFilter::new(crate::constants::defaults::LOG_LEVEL))
}
