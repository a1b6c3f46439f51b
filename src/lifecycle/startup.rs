//! Startup orchestration and the bootstrap guard.
//!
//! # Responsibilities
//! - Check that every required environment variable is set before serving
//! - Report the missing variables for the named service
//! - Halt the process on a failed check
//!
//! # Design Decisions
//! - Fail fast: a misconfigured service never begins accepting traffic
//! - One-shot, no retries
//! - The check itself is pure and returns an explicit outcome; terminating the
//!   process is delegated to an [`ExitHandler`] so tests can observe it

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use crate::config::env::EnvSource;

/// Exit status used when bootstrap validation fails.
pub const BOOTSTRAP_EXIT_CODE: i32 = 1;

/// Validated runtime configuration of a service.
///
/// Only produced by a successful bootstrap check, so every required variable
/// is guaranteed to hold a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    service_name: String,
    values: BTreeMap<String, String>,
}

impl ServiceConfig {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Value of a required variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Diagnostic for a service that must not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapFailure {
    pub service_name: String,
    pub missing: Vec<String>,
}

impl fmt::Display for BootstrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: missing required environment variables: {}",
            self.service_name,
            self.missing.join(", ")
        )
    }
}

impl std::error::Error for BootstrapFailure {}

/// Result of a bootstrap check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// All required variables present.
    Ready(ServiceConfig),
    /// The process was told to exit.
    Halted(BootstrapFailure),
}

/// Terminates the process after a failed bootstrap.
pub trait ExitHandler: Send + Sync {
    fn exit(&self, code: i32);
}

/// Exits the real process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl ExitHandler for ProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Records the requested exit code instead of exiting.
#[derive(Debug, Default)]
pub struct RecordedExit {
    code: Mutex<Option<i32>>,
}

impl RecordedExit {
    pub fn new() -> Self {
        Self::default()
    }

    /// The exit code requested so far, if any.
    pub fn code(&self) -> Option<i32> {
        *self.code.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ExitHandler for RecordedExit {
    fn exit(&self, code: i32) {
        *self.code.lock().unwrap_or_else(|e| e.into_inner()) = Some(code);
    }
}

/// Pure bootstrap check: which required variables are unset or empty.
pub fn check_required<S: AsRef<str>>(
    required: &[S],
    service_name: &str,
    env: &dyn EnvSource,
) -> BootstrapOutcome {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();

    for name in required {
        let name = name.as_ref();
        match env.non_empty(name) {
            Some(value) => {
                values.insert(name.to_string(), value);
            }
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }
    }

    if missing.is_empty() {
        BootstrapOutcome::Ready(ServiceConfig {
            service_name: service_name.to_string(),
            values,
        })
    } else {
        BootstrapOutcome::Halted(BootstrapFailure {
            service_name: service_name.to_string(),
            missing,
        })
    }
}

/// Runs the bootstrap check against an environment and exits on failure.
pub struct BootstrapGuard<'a> {
    env: &'a dyn EnvSource,
    exit: &'a dyn ExitHandler,
}

impl<'a> BootstrapGuard<'a> {
    pub fn new(env: &'a dyn EnvSource, exit: &'a dyn ExitHandler) -> Self {
        Self { env, exit }
    }

    /// Validate `required` for `service_name`.
    ///
    /// On failure logs a diagnostic naming the service and every missing
    /// variable, then calls the exit handler with [`BOOTSTRAP_EXIT_CODE`].
    /// With [`ProcessExit`] this never returns.
    pub fn validate<S: AsRef<str>>(&self, required: &[S], service_name: &str) -> BootstrapOutcome {
        let outcome = check_required(required, service_name, self.env);
        match &outcome {
            BootstrapOutcome::Ready(config) => {
                tracing::info!(
                    service = %service_name,
                    checked = config.values.len(),
                    "Bootstrap environment check passed"
                );
            }
            BootstrapOutcome::Halted(failure) => {
                tracing::error!(
                    service = %failure.service_name,
                    missing = ?failure.missing,
                    "Missing required environment variables, refusing to start"
                );
                self.exit.exit(BOOTSTRAP_EXIT_CODE);
            }
        }
        outcome
    }
}
