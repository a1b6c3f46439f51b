//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, or marketplace defaults)
//!     → env.rs overrides (PORT, GATEWAY_ENV/NODE_ENV, *_SERVICE_URL, INTERNAL_API_KEY, FRONTEND_URL)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use loader::{load_with_env, ConfigError};
pub use schema::{
    BootstrapConfig, CorsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, OtpConfig,
    RateLimitConfig, RuntimeMode, ScanConfig, TimeoutConfig, UpstreamConfig,
};
