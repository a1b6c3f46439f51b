//! Cross-origin policy for browser clients.
//!
//! # Responsibilities
//! - Answer preflights for allowlisted origins
//! - Echo the caller's origin (never `*`) so credentials can be sent
//! - Leave requests without an `Origin` header alone (curl, mobile apps)
//!
//! Origins outside the allowlist get no CORS headers, so the browser
//! refuses to hand the response to the page.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::http::request::X_REQUEST_ID;

/// Build the CORS layer. Entries that cannot be an origin are skipped.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            if origin.trim() == "*" {
                tracing::warn!("Wildcard CORS origin ignored; list origins explicitly");
                return None;
            }
            match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Invalid CORS origin in config; skipping");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs))
}
