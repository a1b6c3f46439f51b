//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment mode (development, production, test).
    pub environment: RuntimeMode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend services and the path prefixes they own.
    pub upstreams: Vec<UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// One-time passcode settings.
    pub otp: OtpConfig,

    /// Attachment scanning settings.
    pub scanning: ScanConfig,

    /// Internal trust API settings.
    pub internal: InternalApiConfig,

    /// Browser origins allowed to call the gateway.
    pub cors: CorsConfig,

    /// Environment variables that must be present before serving traffic.
    pub bootstrap: BootstrapConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode. Selects log format and is reported by `GET /`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
    Test,
}

impl RuntimeMode {
    /// Parse a mode name. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// A backend service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Service identifier for logging/metrics (e.g. "review").
    pub name: String,

    /// Base URL of the service (e.g. "http://localhost:5006").
    pub base_url: String,

    /// Environment variable that overrides `base_url`.
    #[serde(default)]
    pub url_env: Option<String>,

    /// Path prefixes forwarded to this service.
    pub path_prefixes: Vec<String>,
}

impl UpstreamConfig {
    fn local(name: &str, port: u16, url_env: &str, prefixes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            base_url: format!("http://localhost:{}", port),
            url_env: Some(url_env.to_string()),
            path_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// The marketplace services with their local development defaults.
    pub fn marketplace_defaults() -> Vec<Self> {
        vec![
            Self::local("auth", 5001, "AUTH_SERVICE_URL", &["/api/auth"]),
            Self::local(
                "user",
                5002,
                "USER_SERVICE_URL",
                &["/api/users", "/api/workers", "/api/hirers"],
            ),
            Self::local("job", 5003, "JOB_SERVICE_URL", &["/api/jobs"]),
            Self::local(
                "messaging",
                5004,
                "MESSAGING_SERVICE_URL",
                &["/api/messages", "/api/conversations"],
            ),
            Self::local("payment", 5005, "PAYMENT_SERVICE_URL", &["/api/payments"]),
            Self::local("review", 5006, "REVIEW_SERVICE_URL", &["/api/reviews"]),
        ]
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for an upstream to return response headers, in seconds.
    pub upstream_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 10,
            request_secs: 30,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Length of a counting window in seconds.
    pub window_secs: u64,

    /// Maximum requests per client within one window.
    pub max_requests: u64,

    /// Use the first X-Forwarded-For hop as client identity.
    pub trust_forwarded_for: bool,

    /// How often elapsed budgets are swept from memory, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            trust_forwarded_for: false,
            sweep_interval_secs: 60,
        }
    }
}

/// One-time passcode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Passcode lifetime in seconds.
    pub ttl_secs: u64,

    /// Mismatched attempts tolerated before the passcode is dropped.
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10 * 60,
            max_attempts: 5,
        }
    }
}

/// Attachment scanning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Capacity of the completion queue fed by the webhook.
    pub completion_queue: usize,

    /// Capacity of the scan event broadcast buffer.
    pub event_buffer: usize,

    /// Largest inline upload accepted for scanning, in bytes.
    pub max_inline_bytes: usize,

    /// How long a clean or infected result stays queryable after it settled.
    /// Pending results are kept until they settle.
    pub result_ttl_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            completion_queue: 1024,
            event_buffer: 256,
            max_inline_bytes: 10 * 1024 * 1024, // 10MB
            result_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Internal trust API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InternalApiConfig {
    /// Shared key expected in the `x-internal-request` header.
    /// Empty disables the internal API.
    pub api_key: String,
}

/// Cross-origin settings for browser clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins (scheme, host and port) that may make credentialed
    /// cross-origin requests. `FRONTEND_URL` is appended at load time.
    pub allowed_origins: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// How long browsers may cache a preflight answer, in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: [
                "http://localhost:3000",
                "http://localhost:5173",
                "http://127.0.0.1:5173",
                "https://kelmah-frontend-cyan.vercel.app",
                "https://kelmah-frontend-mu.vercel.app",
            ]
            .iter()
            .map(|o| o.to_string())
            .collect(),
            allow_credentials: true,
            max_age_secs: 600,
        }
    }
}

/// Bootstrap requirements.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Service name used in bootstrap diagnostics.
    pub service_name: String,

    /// Variables that must be set and non-empty.
    pub required_env: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            service_name: "api-gateway".to_string(),
            required_env: vec!["INTERNAL_API_KEY".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines. Production mode always does.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Default configuration with the marketplace upstream table filled in.
    pub fn marketplace() -> Self {
        Self {
            upstreams: UpstreamConfig::marketplace_defaults(),
            ..Self::default()
        }
    }
}
