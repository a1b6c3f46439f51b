//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Pick the output format from the runtime mode
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON format for production, pretty format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ObservabilityConfig, RuntimeMode};

/// Filter used before any configuration has been read.
pub fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("marketplace_gateway={level},tower_http={level}").into()
    })
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_logging(mode: RuntimeMode, config: &ObservabilityConfig) -> bool {
    let filter = default_filter(&config.log_level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logs || mode == RuntimeMode::Production {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.is_ok()
}
