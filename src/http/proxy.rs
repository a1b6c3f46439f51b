//! Upstream forwarding.
//!
//! # Responsibilities
//! - Pick the upstream for the request path
//! - Forward method, path, query, body and end-to-end headers unchanged
//! - Return the upstream's response unchanged apart from hop-by-hop headers
//!
//! # Design Decisions
//! - No body buffering: request and response bodies are streamed
//! - Always HTTP/1.1 towards upstreams

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Version},
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::{call_with_deadline, UpstreamCallError};
use crate::security::headers::{prepare_upstream_headers, strip_hop_by_hop};

/// Fallback handler: everything not served locally goes upstream.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let method_str = method.to_string();
    let path = request.uri().path().to_string();

    let Some(upstream) = state.router.match_path(&path).cloned() else {
        tracing::warn!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_request(&method_str, 404, "none", start_time);
        return GatewayError::NoRoute.into_response();
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = match upstream.target_uri(path_and_query) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, upstream = %upstream.name(), error = %e, "Invalid upstream URI");
            metrics::record_request(&method_str, 502, upstream.name(), start_time);
            return GatewayError::UpstreamUnavailable.into_response();
        }
    };
    parts.version = Version::HTTP_11;
    prepare_upstream_headers(&mut parts.headers, client_ip);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        upstream = %upstream.name(),
        "Proxying request"
    );

    let outbound = Request::from_parts(parts, body);
    match call_with_deadline(state.upstream_timeout, state.client.request(outbound)).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method_str, status.as_u16(), upstream.name(), start_time);
            tracing::debug!(
                request_id = %request_id,
                upstream = %upstream.name(),
                status = status.as_u16(),
                "Upstream responded"
            );

            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            let error = GatewayError::from(&e);
            match &e {
                UpstreamCallError::Timeout(deadline) => tracing::error!(
                    request_id = %request_id,
                    upstream = %upstream.name(),
                    timeout = ?deadline,
                    "Upstream timed out"
                ),
                UpstreamCallError::Failed(source) => tracing::error!(
                    request_id = %request_id,
                    upstream = %upstream.name(),
                    error = %source,
                    "Upstream error"
                ),
            }
            metrics::record_request(&method_str, error.status().as_u16(), upstream.name(), start_time);
            error.into_response()
        }
    }
}
