//! Content safety subsystem.
//!
//! # Data Flow
//! ```text
//! Upload (messaging/user service):
//!     → pipeline.rs scan_inline / scan_by_reference
//!     → engine.rs (pluggable ScanEngine; stub: inline → clean, reference → pending)
//!     → AttachmentScanResult recorded under a scan id
//!
//! Completion (engine webhook):
//!     → ScanCompletion message on the completion queue
//!     → pipeline.rs worker applies it (pending → clean | infected only)
//!     → ScanEvent broadcast; infected objects purged via store.rs
//!
//! Delivery:
//!     → pipeline.rs ensure_deliverable(id): only clean content passes
//! ```
//!
//! # Design Decisions
//! - Completions are messages, never a blocking call into the engine
//! - Terminal states are final for a scan attempt
//! - Results live in process memory, keyed by scan id

pub mod engine;
pub mod pipeline;
pub mod store;
pub mod types;

pub use engine::{ScanEngine, StubScanEngine};
pub use pipeline::ContentSafetyPipeline;
pub use store::{InMemoryObjectStore, ObjectStore, ObjectStoreError};
pub use types::{
    AttachmentRef, AttachmentScanResult, ScanCompletion, ScanError, ScanEvent, ScanStatus,
    ScanVerdict,
};
