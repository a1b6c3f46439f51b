//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup, longest prefix first)
//!     → matcher.rs (segment-boundary prefix test)
//!     → Return: matched Upstream or NoMatch (404)
//!
//! Route Compilation (at startup):
//!     UpstreamConfig[]
//!     → One route per path prefix
//!     → Sort by prefix length
//!     → Freeze as immutable ServiceRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Paths are forwarded unchanged (no prefix stripping)

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{ServiceRouter, Upstream};
