//! Guard for the internal trust API.
//!
//! Backend services call the gateway's `/internal` routes with the shared
//! internal key in `x-internal-request`. The key is compared in constant time.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::http::response::GatewayError;

pub const X_INTERNAL_REQUEST: &str = "x-internal-request";

/// Expected internal key. Empty disables the internal API.
#[derive(Clone)]
pub struct InternalKey(pub Arc<str>);

impl InternalKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    pub fn is_enabled(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn matches(&self, presented: &str) -> bool {
        self.is_enabled() && bool::from(self.0.as_bytes().ct_eq(presented.as_bytes()))
    }
}

pub async fn internal_auth_middleware(
    State(key): State<InternalKey>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !key.is_enabled() {
        return GatewayError::InternalApiDisabled.into_response();
    }

    let presented = request
        .headers()
        .get(X_INTERNAL_REQUEST)
        .and_then(|h| h.to_str().ok());

    match presented {
        Some(value) if key.matches(value) => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected internal request without valid key");
            GatewayError::Unauthorized.into_response()
        }
    }
}
