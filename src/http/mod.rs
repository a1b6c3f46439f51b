//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, rate limiting)
//!     → status.rs (GET /health, GET /)
//!     → otp.rs, scans.rs (internal trust API, key-guarded; extract.rs)
//!     → proxy.rs (everything else → routing → upstream)
//!     → response.rs (gateway errors as {status, error} JSON)
//!     → Send to client
//! ```

pub mod extract;
pub mod otp;
pub mod proxy;
pub mod request;
pub mod response;
pub mod scans;
pub mod server;
pub mod status;

pub use request::X_REQUEST_ID;
pub use response::{ErrorBody, GatewayError};
pub use server::{AppState, GatewayServer};
