//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream URLs and path prefixes
//! - Validate value ranges (timeouts > 0, budgets > 0)
//! - Detect prefixes claimed by more than one upstream
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("upstream '{name}': invalid base URL '{url}'")]
    UpstreamUrl { name: String, url: String },

    #[error("upstream '{name}': unsupported scheme '{scheme}' (only http)")]
    UpstreamScheme { name: String, scheme: String },

    #[error("upstream '{0}' has no path prefixes")]
    NoPrefixes(String),

    #[error("upstream '{name}': path prefix '{prefix}' must start with '/'")]
    PrefixFormat { name: String, prefix: String },

    #[error("path prefix '{prefix}' claimed by both '{first}' and '{second}'")]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("timeouts.request_secs ({request}) must be greater than timeouts.upstream_secs ({upstream})")]
    TimeoutOrder { request: u64, upstream: u64 },

    #[error("invalid CORS origin '{0}'")]
    CorsOrigin(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for upstream in &config.upstreams {
        match Url::parse(&upstream.base_url) {
            Ok(url) if url.scheme() != "http" => errors.push(ValidationError::UpstreamScheme {
                name: upstream.name.clone(),
                scheme: url.scheme().to_string(),
            }),
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::UpstreamUrl {
                name: upstream.name.clone(),
                url: upstream.base_url.clone(),
            }),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::UpstreamUrl {
                name: upstream.name.clone(),
                url: upstream.base_url.clone(),
            }),
        }

        if upstream.path_prefixes.is_empty() {
            errors.push(ValidationError::NoPrefixes(upstream.name.clone()));
        }

        for prefix in &upstream.path_prefixes {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::PrefixFormat {
                    name: upstream.name.clone(),
                    prefix: prefix.clone(),
                });
                continue;
            }
            let normalized = normalize_prefix(prefix);
            if let Some(first) = owners.insert(normalized, &upstream.name) {
                errors.push(ValidationError::DuplicatePrefix {
                    prefix: prefix.clone(),
                    first: first.to_string(),
                    second: upstream.name.clone(),
                });
            }
        }
    }

    let positive = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.max_requests", config.rate_limit.max_requests),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("otp.ttl_secs", config.otp.ttl_secs),
        ("otp.max_attempts", config.otp.max_attempts as u64),
        ("scanning.completion_queue", config.scanning.completion_queue as u64),
        ("scanning.event_buffer", config.scanning.event_buffer as u64),
        ("scanning.max_inline_bytes", config.scanning.max_inline_bytes as u64),
        ("scanning.result_ttl_secs", config.scanning.result_ttl_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    // The outer deadline must leave room for the upstream one to answer 504.
    if config.timeouts.request_secs <= config.timeouts.upstream_secs {
        errors.push(ValidationError::TimeoutOrder {
            request: config.timeouts.request_secs,
            upstream: config.timeouts.upstream_secs,
        });
    }

    for origin in &config.cors.allowed_origins {
        if !is_valid_origin(origin) {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin is `scheme://host[:port]` with nothing after it. Wildcards are
/// refused since credentials are allowed.
pub(crate) fn is_valid_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && !origin.ends_with('/')
                && url.query().is_none()
                && url.fragment().is_none()
                && url.username().is_empty()
        }
        Err(_) => false,
    }
}

/// Strip a trailing slash so "/api/jobs/" and "/api/jobs" compare equal.
pub(crate) fn normalize_prefix(prefix: &str) -> &str {
    if prefix.len() > 1 {
        prefix.trim_end_matches('/')
    } else {
        prefix
    }
}
