//! Passcode storage.

use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::otp::types::OneTimePasscode;

/// What to do with a passcode after it has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Keep,
    Remove,
}

/// Storage for live passcodes, one per subject.
pub trait PasscodeStore: Send + Sync {
    /// Store `passcode`, replacing any previous one for the same subject.
    fn put(&self, passcode: OneTimePasscode);

    /// Run `f` on the subject's passcode while holding it exclusively, then
    /// keep or drop it as `f` decides. Returns false if no passcode exists.
    fn update(&self, subject: &str, f: &mut dyn FnMut(&mut OneTimePasscode) -> Retention) -> bool;

    fn get(&self, subject: &str) -> Option<OneTimePasscode>;

    /// Drop passcodes that expired before `now`. Returns how many were removed.
    fn sweep_expired(&self, now: Instant) -> usize;
}

/// Process-local passcode table.
#[derive(Debug, Default)]
pub struct InMemoryPasscodeStore {
    entries: DashMap<String, OneTimePasscode>,
}

impl InMemoryPasscodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PasscodeStore for InMemoryPasscodeStore {
    fn put(&self, passcode: OneTimePasscode) {
        self.entries.insert(passcode.subject().to_string(), passcode);
    }

    fn update(&self, subject: &str, f: &mut dyn FnMut(&mut OneTimePasscode) -> Retention) -> bool {
        match self.entries.entry(subject.to_string()) {
            Entry::Occupied(mut occupied) => {
                if f(occupied.get_mut()) == Retention::Remove {
                    occupied.remove();
                }
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    fn get(&self, subject: &str) -> Option<OneTimePasscode> {
        self.entries.get(subject).map(|p| p.value().clone())
    }

    fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, passcode| !passcode.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }
}
