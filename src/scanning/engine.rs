//! Pluggable scan engines.

use async_trait::async_trait;

use crate::scanning::types::ScanVerdict;

/// A virus/malware scanner.
///
/// Inline buffers are already in memory and are classified synchronously.
/// Object references may need I/O; an engine that scans them in the
/// background answers `pending` and reports the outcome later through the
/// completion webhook.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Identifier recorded on every result.
    fn name(&self) -> &str;

    fn scan_inline(&self, buffer: &[u8], filename: &str) -> ScanVerdict;

    async fn scan_by_reference(&self, object_key: &str) -> ScanVerdict;
}

/// Placeholder engine: inline content passes, references wait for a callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubScanEngine;

#[async_trait]
impl ScanEngine for StubScanEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn scan_inline(&self, _buffer: &[u8], _filename: &str) -> ScanVerdict {
        ScanVerdict::clean()
    }

    async fn scan_by_reference(&self, _object_key: &str) -> ScanVerdict {
        ScanVerdict::pending("awaiting asynchronous scan")
    }
}
