//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → connect timeout (HttpConnector)
//!     → timeouts.rs (deadline on the whole upstream exchange)
//!     → Timeout → 504, connection/protocol error → 502
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries: forwarded requests are not assumed idempotent

pub mod timeouts;

pub use timeouts::{call_with_deadline, UpstreamCallError};
