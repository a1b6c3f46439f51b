//! Gateway-local status endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

/// Public view of an upstream. Hostnames stay private to the gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub path_prefixes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub name: String,
    pub version: String,
    pub mode: String,
    pub services: Vec<ServiceInfo>,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "UP".to_string(),
        message: "API Gateway is running".to_string(),
    })
}

pub async fn info(State(state): State<AppState>) -> Json<GatewayInfo> {
    let services = state
        .config
        .upstreams
        .iter()
        .map(|u| ServiceInfo {
            name: u.name.clone(),
            path_prefixes: u.path_prefixes.clone(),
        })
        .collect();

    Json(GatewayInfo {
        name: state.config.bootstrap.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.config.environment.as_str().to_string(),
        services,
    })
}
