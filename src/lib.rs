//! Marketplace API gateway library.
//!
//! Single public entry point for the marketplace backend services. Forwards
//! requests by path prefix, rate limits clients, and hosts the trust
//! services backend services call over the internal API: one-time passcodes
//! and attachment scanning.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod otp;
pub mod resilience;
pub mod routing;
pub mod scanning;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
