//! Passcode types.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a passcode.
pub const CODE_LENGTH: usize = 6;
/// Smallest code value; keeps every code at six digits without padding.
pub const CODE_MIN: u32 = 100_000;
/// Largest code value.
pub const CODE_MAX: u32 = 999_999;

/// A passcode issued for one subject.
#[derive(Debug, Clone)]
pub struct OneTimePasscode {
    subject: String,
    code: String,
    issued_at: Instant,
    ttl: Duration,
    pub(crate) failed_attempts: u32,
}

impl OneTimePasscode {
    pub(crate) fn new(subject: String, code: String, issued_at: Instant, ttl: Duration) -> Self {
        Self {
            subject,
            code,
            issued_at,
            ttl,
            failed_attempts: 0,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.ttl
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Result of checking a candidate code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyOutcome {
    Valid,
    Invalid,
    Expired,
}

impl VerifyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyOutcome::Valid => "valid",
            VerifyOutcome::Invalid => "invalid",
            VerifyOutcome::Expired => "expired",
        }
    }

    pub fn into_result(self) -> Result<(), OtpError> {
        match self {
            VerifyOutcome::Valid => Ok(()),
            VerifyOutcome::Invalid => Err(OtpError::Mismatch),
            VerifyOutcome::Expired => Err(OtpError::Expired),
        }
    }
}

/// User-facing verification failures. The caller may request a new code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("Invalid verification code")]
    Mismatch,

    #[error("Verification code expired")]
    Expired,
}
