//! One-time passcode subsystem.
//!
//! # Data Flow
//! ```text
//! Identity confirmation request (auth/user service):
//!     → authority.rs issue(subject) → 6-digit code, replaces any prior code
//!     → caller delivers the code out of band (SMS/email)
//!
//! Confirmation:
//!     → authority.rs verify(subject, candidate)
//!     → store.rs atomic check-and-consume under the subject's lock
//!     → Valid | Invalid | Expired
//! ```
//!
//! # Design Decisions
//! - Codes are single use and live in process memory only
//! - Replicas do not share codes; the store trait is the seam for a shared backend
//! - Mismatches never reveal whether a code exists for the subject

pub mod authority;
pub mod store;
pub mod types;

pub use authority::OtpAuthority;
pub use store::{InMemoryPasscodeStore, PasscodeStore, Retention};
pub use types::{OneTimePasscode, OtpError, VerifyOutcome};
