//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Init logging → Check required env (fatal on miss) → Initialize subsystems → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Stop background tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first (it names the required variables), then
//!   the environment check, then core, then listener
//! - Background tasks (budget sweeper, scan completions) share one shutdown signal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{
    check_required, BootstrapFailure, BootstrapGuard, BootstrapOutcome, ExitHandler, ProcessExit,
    RecordedExit, ServiceConfig,
};
