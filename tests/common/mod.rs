//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use marketplace_gateway::config::{GatewayConfig, UpstreamConfig};
use marketplace_gateway::{GatewayServer, Shutdown};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const INTERNAL_KEY: &str = "test-internal-key";

/// Start a backend that answers 201 with a JSON description of the request
/// it received.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    (
        StatusCode::CREATED,
        [("x-backend", "echo")],
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_request_id": header("x-request-id"),
            "x_custom": header("x-custom"),
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// Start a backend that reads the request and answers only after `delay`.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        tokio::time::sleep(delay).await;
                        let body = "late";
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn upstream(name: &str, addr: SocketAddr, prefixes: &[&str]) -> UpstreamConfig {
    UpstreamConfig {
        name: name.to_string(),
        base_url: format!("http://{}", addr),
        url_env: None,
        path_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
    }
}

/// Defaults with the internal API enabled and metrics off.
pub fn base_config(upstreams: Vec<UpstreamConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstreams = upstreams;
    config.internal.api_key = INTERNAL_KEY.to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Serve `server` on an ephemeral port until the returned coordinator fires.
pub async fn start_server(server: GatewayServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });
    (addr, shutdown)
}

pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    start_server(GatewayServer::new(config)).await
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
