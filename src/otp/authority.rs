//! Passcode issuance and verification.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::config::OtpConfig;
use crate::observability::metrics;
use crate::otp::store::{InMemoryPasscodeStore, PasscodeStore, Retention};
use crate::otp::types::{OneTimePasscode, VerifyOutcome, CODE_MAX, CODE_MIN};

/// Issues and checks one-time passcodes.
#[derive(Clone)]
pub struct OtpAuthority {
    store: Arc<dyn PasscodeStore>,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpAuthority {
    pub fn new(ttl: Duration, max_attempts: u32) -> Self {
        Self::with_store(Arc::new(InMemoryPasscodeStore::new()), ttl, max_attempts)
    }

    pub fn with_store(store: Arc<dyn PasscodeStore>, ttl: Duration, max_attempts: u32) -> Self {
        Self {
            store,
            ttl,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &OtpConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_attempts)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh passcode for `subject`, invalidating any earlier one.
    pub fn issue(&self, subject: &str) -> OneTimePasscode {
        self.issue_at(subject, Instant::now())
    }

    pub fn issue_at(&self, subject: &str, now: Instant) -> OneTimePasscode {
        let passcode = OneTimePasscode::new(subject.to_string(), generate_code(), now, self.ttl);
        self.store.put(passcode.clone());
        metrics::record_otp_issued();
        tracing::debug!(subject = %subject, ttl_secs = self.ttl.as_secs(), "Issued one-time passcode");
        passcode
    }

    /// Check `candidate` against the subject's current passcode.
    pub fn verify(&self, subject: &str, candidate: &str) -> VerifyOutcome {
        self.verify_at(subject, candidate, Instant::now())
    }

    /// A matching code is consumed. An expired code is dropped whatever the
    /// candidate. A wrong code counts against `max_attempts`.
    pub fn verify_at(&self, subject: &str, candidate: &str, now: Instant) -> VerifyOutcome {
        let max_attempts = self.max_attempts;
        let mut outcome = VerifyOutcome::Invalid;

        self.store.update(subject, &mut |passcode| {
            let matches: bool = passcode.code().as_bytes().ct_eq(candidate.as_bytes()).into();

            if passcode.is_expired_at(now) {
                if matches {
                    outcome = VerifyOutcome::Expired;
                }
                return Retention::Remove;
            }

            if matches {
                outcome = VerifyOutcome::Valid;
                return Retention::Remove;
            }

            passcode.failed_attempts += 1;
            if passcode.failed_attempts >= max_attempts {
                tracing::warn!(subject = %subject, attempts = passcode.failed_attempts, "Passcode attempts exhausted, dropping code");
                Retention::Remove
            } else {
                Retention::Keep
            }
        });

        metrics::record_otp_verification(outcome.as_str());
        tracing::debug!(subject = %subject, outcome = outcome.as_str(), "Verified one-time passcode");
        outcome
    }

    /// Drop expired passcodes. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        self.store.sweep_expired(now)
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}
