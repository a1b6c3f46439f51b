//! Scan result types and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Classification of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Clean,
    Infected,
}

impl ScanStatus {
    /// Clean and infected are final for a scan attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachmentRef {
    /// Caller-supplied buffer, already in memory.
    Inline { filename: String, size: usize },
    /// Object held in the attachment store.
    Object { key: String },
}

/// An engine's answer for one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanVerdict {
    pub status: ScanStatus,
    pub details: Option<String>,
}

impl ScanVerdict {
    pub fn clean() -> Self {
        Self { status: ScanStatus::Clean, details: None }
    }

    pub fn pending(details: impl Into<String>) -> Self {
        Self { status: ScanStatus::Pending, details: Some(details.into()) }
    }

    pub fn infected(details: impl Into<String>) -> Self {
        Self { status: ScanStatus::Infected, details: Some(details.into()) }
    }
}

/// Recorded outcome of one scan attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentScanResult {
    pub id: Uuid,
    pub attachment: AttachmentRef,
    pub status: ScanStatus,
    pub engine: String,
    pub details: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AttachmentScanResult {
    pub fn new(attachment: AttachmentRef, engine: &str, verdict: ScanVerdict) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            attachment,
            status: verdict.status,
            engine: engine.to_string(),
            details: verdict.details,
            submitted_at: now,
            completed_at: verdict.status.is_terminal().then_some(now),
        }
    }

    /// Move a pending scan to a terminal status.
    pub fn transition(&mut self, to: ScanStatus, details: Option<String>) -> Result<(), ScanError> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(ScanError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        if details.is_some() {
            self.details = details;
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_deliverable(&self) -> bool {
        self.status == ScanStatus::Clean
    }

    /// Only clean content may be shown to other users.
    pub fn ensure_deliverable(&self) -> Result<(), ScanError> {
        match self.status {
            ScanStatus::Clean => Ok(()),
            ScanStatus::Pending => Err(ScanError::Pending(self.id)),
            ScanStatus::Infected => Err(ScanError::Infected(self.id)),
        }
    }

    pub fn object_key(&self) -> Option<&str> {
        match &self.attachment {
            AttachmentRef::Object { key } => Some(key),
            AttachmentRef::Inline { .. } => None,
        }
    }
}

/// Out-of-band completion for a pending scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCompletion {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub details: Option<String>,
}

/// Terminal outcome broadcast to interested parties (uploader notification,
/// moderation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "result", rename_all = "snake_case")]
pub enum ScanEvent {
    Cleared(AttachmentScanResult),
    Infected(AttachmentScanResult),
}

impl ScanEvent {
    pub fn result(&self) -> &AttachmentScanResult {
        match self {
            ScanEvent::Cleared(r) | ScanEvent::Infected(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("attachment scan {0} not found")]
    NotFound(Uuid),

    #[error("attachment scan {0} is still pending")]
    Pending(Uuid),

    #[error("attachment scan {0} found infected content")]
    Infected(Uuid),

    #[error("attachment scan {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("scan completion queue closed")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> AttachmentScanResult {
        AttachmentScanResult::new(
            AttachmentRef::Object { key: "s3://bucket/key".into() },
            "stub",
            ScanVerdict::pending("queued"),
        )
    }

    #[test]
    fn test_pending_moves_forward_once() {
        let mut result = pending();
        assert!(result.completed_at.is_none());

        result.transition(ScanStatus::Clean, None).unwrap();
        assert_eq!(result.status, ScanStatus::Clean);
        assert_eq!(result.details.as_deref(), Some("queued"));
        assert!(result.completed_at.is_some());

        let err = result.transition(ScanStatus::Infected, None).unwrap_err();
        assert!(matches!(err, ScanError::InvalidTransition { from: ScanStatus::Clean, .. }));
    }

    #[test]
    fn test_terminal_never_returns_to_pending() {
        for terminal in [ScanStatus::Clean, ScanStatus::Infected] {
            let mut result = pending();
            result.transition(terminal, Some("done".into())).unwrap();
            assert!(result.transition(ScanStatus::Pending, None).is_err());
            assert_eq!(result.status, terminal);
        }
    }

    #[test]
    fn test_pending_to_pending_rejected() {
        let mut result = pending();
        assert!(result.transition(ScanStatus::Pending, None).is_err());
    }

    #[test]
    fn test_only_clean_is_deliverable() {
        let mut result = pending();
        assert_eq!(result.ensure_deliverable(), Err(ScanError::Pending(result.id)));
        result.transition(ScanStatus::Infected, Some("Eicar-Test-Signature".into())).unwrap();
        assert_eq!(result.ensure_deliverable(), Err(ScanError::Infected(result.id)));
        assert!(!result.is_deliverable());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["attachment"]["kind"], "object");
        assert_eq!(json["attachment"]["key"], "s3://bucket/key");
    }
}
