//! Gateway-level error responses.
//!
//! # Responsibilities
//! - Map gateway failures to HTTP status codes
//! - Render every failure as `{"status": <code>, "error": <message>}`
//!
//! # Design Decisions
//! - Messages are fixed strings; upstream hostnames, IO errors and other
//!   internal detail only go to the logs
//! - Upstream timeouts are 504, connection failures are 502
//! - Responses produced by tower layers (body limit, request deadline) are
//!   rewritten into the same shape

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned with every 429.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

/// Machine-readable error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
}

/// Errors the gateway itself answers with.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("no route for path")]
    NoRoute,

    #[error("upstream unavailable")]
    UpstreamUnavailable,

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("missing or invalid internal credentials")]
    Unauthorized,

    #[error("internal API disabled")]
    InternalApiDisabled,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("request deadline exceeded")]
    RequestTimeout,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NoRoute | GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::InternalApiDisabled | GatewayError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Gone(_) => StatusCode::GONE,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Caller-facing message.
    pub fn message(&self) -> String {
        match self {
            GatewayError::RateLimited => RATE_LIMIT_MESSAGE.to_string(),
            GatewayError::NoRoute => "No matching route found".to_string(),
            GatewayError::UpstreamUnavailable => "Upstream service unavailable".to_string(),
            GatewayError::UpstreamTimeout => "Upstream service timed out".to_string(),
            GatewayError::Unauthorized => "Internal credentials required".to_string(),
            GatewayError::InternalApiDisabled => "Internal API disabled".to_string(),
            GatewayError::PayloadTooLarge => "Request body too large".to_string(),
            GatewayError::RequestTimeout => "Request timed out".to_string(),
            GatewayError::BadRequest(msg)
            | GatewayError::NotFound(msg)
            | GatewayError::Conflict(msg)
            | GatewayError::Gone(msg)
            | GatewayError::Unavailable(msg) => msg.clone(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status().as_u16(),
            error: self.message(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Error handler for fallible tower layers (`HandleErrorLayer`).
pub async fn handle_layer_error(err: BoxError) -> GatewayError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return GatewayError::RequestTimeout;
    }
    tracing::error!(error = %err, "Middleware failed");
    GatewayError::Unavailable("Service unavailable".to_string())
}

/// Rewrite plain-text 413 answers (body limit layer, byte extractors) into
/// the JSON error shape. JSON responses pass through untouched.
pub async fn json_layer_errors(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json && response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return GatewayError::PayloadTooLarge.into_response();
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_body() {
        let body = serde_json::to_value(GatewayError::RateLimited.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "status": 429,
                "error": "Too many requests, please try again later."
            })
        );
    }

    #[test]
    fn test_upstream_errors_do_not_leak_detail() {
        assert_eq!(GatewayError::UpstreamUnavailable.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(GatewayError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(!GatewayError::UpstreamUnavailable.message().contains("localhost"));
    }

    async fn error_body(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_request_deadline_answers_json_408() {
        use axum::{error_handling::HandleErrorLayer, routing::get, Router};
        use std::time::Duration;
        use tower::{ServiceBuilder, ServiceExt};

        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    "late"
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_layer_error))
                    .timeout(Duration::from_millis(20)),
            );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/slow")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            error_body(response).await,
            ErrorBody { status: 408, error: "Request timed out".into() }
        );
    }

    #[tokio::test]
    async fn test_plain_413_rewritten() {
        let plain = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let response = json_layer_errors(plain).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(error_body(response).await.error, "Request body too large");

        let other = (StatusCode::IM_A_TEAPOT, "short and stout").into_response();
        assert_eq!(json_layer_errors(other).await.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_into_response() {
        let response = GatewayError::NoRoute.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, 404);
    }
}
