//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::env::EnvSource;
use crate::config::schema::{GatewayConfig, RuntimeMode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the effective configuration: file (or marketplace defaults),
/// then environment overrides, then validation.
pub fn load_with_env(path: Option<&Path>, env: &dyn EnvSource) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => GatewayConfig::marketplace(),
    };
    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto a parsed configuration.
///
/// Recognised: `PORT`, `GATEWAY_ENV` (falling back to `NODE_ENV`),
/// `INTERNAL_API_KEY`, `FRONTEND_URL` (added to the CORS allowlist), and each
/// upstream's `url_env`.
pub fn apply_env_overrides(config: &mut GatewayConfig, env: &dyn EnvSource) -> Result<(), ConfigError> {
    if let Some(port) = env.non_empty("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: "PORT",
            value: port.clone(),
        })?;
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{}", port),
        };
    }

    let mode = env
        .non_empty("GATEWAY_ENV")
        .map(|v| ("GATEWAY_ENV", v))
        .or_else(|| env.non_empty("NODE_ENV").map(|v| ("NODE_ENV", v)));
    if let Some((name, value)) = mode {
        config.environment =
            RuntimeMode::parse(&value).ok_or(ConfigError::InvalidEnv { name, value })?;
    }

    if let Some(key) = env.non_empty("INTERNAL_API_KEY") {
        config.internal.api_key = key;
    }

    if let Some(frontend) = env.non_empty("FRONTEND_URL") {
        let origin = frontend.trim().trim_end_matches('/').to_string();
        if !config.cors.allowed_origins.contains(&origin) {
            config.cors.allowed_origins.push(origin);
        }
    }

    for upstream in &mut config.upstreams {
        if let Some(url) = upstream.url_env.as_deref().and_then(|name| env.non_empty(name)) {
            tracing::debug!(upstream = %upstream.name, url = %url, "Upstream URL overridden from environment");
            upstream.base_url = url;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::MapEnv;

    #[test]
    fn test_env_overrides() {
        let env = MapEnv::new()
            .with("PORT", "8088")
            .with("NODE_ENV", "production")
            .with("INTERNAL_API_KEY", "s3cret")
            .with("REVIEW_SERVICE_URL", "http://review.internal:7000");

        let config = load_with_env(None, &env).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8088");
        assert_eq!(config.environment, RuntimeMode::Production);
        assert_eq!(config.internal.api_key, "s3cret");

        let review = config.upstreams.iter().find(|u| u.name == "review").unwrap();
        assert_eq!(review.base_url, "http://review.internal:7000");
        let auth = config.upstreams.iter().find(|u| u.name == "auth").unwrap();
        assert_eq!(auth.base_url, "http://localhost:5001");
    }

    #[test]
    fn test_frontend_url_joins_cors_allowlist() {
        let env = MapEnv::new().with("FRONTEND_URL", "https://app.example.com/");
        let config = load_with_env(None, &env).unwrap();
        assert!(config
            .cors
            .allowed_origins
            .contains(&"https://app.example.com".to_string()));
        assert!(config
            .cors
            .allowed_origins
            .contains(&"http://localhost:3000".to_string()));

        let env = MapEnv::new().with("FRONTEND_URL", "http://localhost:3000");
        let config = load_with_env(None, &env).unwrap();
        let defaults = crate::config::CorsConfig::default().allowed_origins.len();
        assert_eq!(config.cors.allowed_origins.len(), defaults);
    }

    #[test]
    fn test_gateway_env_wins_over_node_env() {
        let env = MapEnv::new()
            .with("GATEWAY_ENV", "test")
            .with("NODE_ENV", "production");
        let config = load_with_env(None, &env).unwrap();
        assert_eq!(config.environment, RuntimeMode::Test);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let env = MapEnv::new().with("PORT", "eighty");
        let err = load_with_env(None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let env = MapEnv::new().with("JOB_SERVICE_URL", "https://jobs.example.com");
        let err = load_with_env(None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
            [listener]
            bind_address = "127.0.0.1:6000"

            [[upstreams]]
            name = "review"
            base_url = "http://localhost:5006"
            url_env = "REVIEW_SERVICE_URL"
            path_prefixes = ["/api/reviews"]
            "#,
        )
        .unwrap();

        let config = load_with_env(Some(&path), &MapEnv::new().with("PORT", "6001")).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:6001");
        assert_eq!(config.upstreams.len(), 1);

        let plain = load_with_env(Some(&path), &MapEnv::new()).unwrap();
        assert_eq!(plain.listener.bind_address, "127.0.0.1:6000");

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
