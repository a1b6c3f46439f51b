//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin allowlist, preflights)
//!     → rate_limit.rs (per-client fixed-window budget)
//!     → internal_auth.rs (internal key, /internal routes only)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*) before forwarding
//!     → Pass to routing
//!
//! Outgoing response:
//!     → response_headers.rs (hardening headers when absent)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input (X-Forwarded-For only when configured)

pub mod cors;
pub mod headers;
pub mod internal_auth;
pub mod rate_limit;
pub mod response_headers;

pub use cors::cors_layer;
pub use internal_auth::{internal_auth_middleware, InternalKey, X_INTERNAL_REQUEST};
pub use rate_limit::{
    rate_limit_middleware, Admission, BudgetStore, FixedWindowLimiter, InMemoryBudgetStore,
    RateBudget, RateLimitState,
};
pub use response_headers::{with_security_headers, SECURITY_HEADERS};
