//! Content safety pipeline.
//!
//! Records a result for every scan request, accepts out-of-band completions
//! for pending scans over a bounded queue, and gates delivery on a clean
//! verdict. Settled results are kept for `result_ttl_secs` and then swept.
//!
//! The completion worker drains whatever is already queued before it exits,
//! so a webhook that was accepted with 202 is always applied.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::ScanConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::scanning::engine::ScanEngine;
use crate::scanning::store::ObjectStore;
use crate::scanning::types::{
    AttachmentRef, AttachmentScanResult, ScanCompletion, ScanError, ScanEvent, ScanStatus,
};

pub struct ContentSafetyPipeline {
    engine: Arc<dyn ScanEngine>,
    objects: Arc<dyn ObjectStore>,
    results: DashMap<Uuid, AttachmentScanResult>,
    result_ttl: Duration,
    completions: mpsc::Sender<ScanCompletion>,
    events: broadcast::Sender<ScanEvent>,
}

impl ContentSafetyPipeline {
    /// Build the pipeline and the receiving end of its completion queue.
    /// Hand the receiver to [`run_completions`](Self::run_completions).
    pub fn new(
        engine: Arc<dyn ScanEngine>,
        objects: Arc<dyn ObjectStore>,
        config: &ScanConfig,
    ) -> (Self, mpsc::Receiver<ScanCompletion>) {
        let (completions, rx) = mpsc::channel(config.completion_queue.max(1));
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let pipeline = Self {
            engine,
            objects,
            results: DashMap::new(),
            result_ttl: Duration::from_secs(config.result_ttl_secs),
            completions,
            events,
        };
        (pipeline, rx)
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Classify an in-memory buffer. The result is recorded before returning.
    pub fn scan_inline(&self, buffer: &[u8], filename: &str) -> AttachmentScanResult {
        let verdict = self.engine.scan_inline(buffer, filename);
        let result = AttachmentScanResult::new(
            AttachmentRef::Inline {
                filename: filename.to_string(),
                size: buffer.len(),
            },
            self.engine.name(),
            verdict,
        );
        metrics::record_scan("inline", result.status.as_str());
        tracing::info!(
            scan_id = %result.id,
            filename = %filename,
            size = buffer.len(),
            status = %result.status,
            "Scanned inline attachment"
        );
        self.results.insert(result.id, result.clone());
        self.publish(&result);
        result
    }

    /// Ask the engine about a stored object. Usually answers `pending`.
    pub async fn scan_by_reference(&self, object_key: &str) -> AttachmentScanResult {
        let verdict = self.engine.scan_by_reference(object_key).await;
        let result = AttachmentScanResult::new(
            AttachmentRef::Object {
                key: object_key.to_string(),
            },
            self.engine.name(),
            verdict,
        );
        metrics::record_scan("reference", result.status.as_str());
        tracing::info!(
            scan_id = %result.id,
            object_key = %object_key,
            status = %result.status,
            "Submitted attachment for scanning"
        );
        self.results.insert(result.id, result.clone());
        if result.status.is_terminal() {
            self.settle(&result).await;
        }
        result
    }

    pub fn status(&self, id: Uuid) -> Option<AttachmentScanResult> {
        self.results.get(&id).map(|r| r.clone())
    }

    /// The result, if and only if the attachment may be shown to others.
    pub fn ensure_deliverable(&self, id: Uuid) -> Result<AttachmentScanResult, ScanError> {
        let result = self.status(id).ok_or(ScanError::NotFound(id))?;
        result.ensure_deliverable()?;
        Ok(result)
    }

    /// Queue a completion for the worker. Waits while the queue is full.
    pub async fn submit_completion(&self, completion: ScanCompletion) -> Result<(), ScanError> {
        self.completions
            .send(completion)
            .await
            .map_err(|_| ScanError::QueueClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Forget settled results older than the retention period. Pending
    /// results stay. Returns how many were removed.
    pub fn sweep_settled(&self, now: DateTime<Utc>) -> usize {
        let before = self.results.len();
        let ttl = self.result_ttl;
        self.results.retain(|_, result| match result.completed_at {
            Some(completed) => now
                .signed_duration_since(completed)
                .to_std()
                .map_or(true, |age| age < ttl),
            None => true,
        });
        before.saturating_sub(self.results.len())
    }

    /// Apply one completion. Only `pending → clean | infected` is accepted.
    pub async fn apply_completion(
        &self,
        completion: ScanCompletion,
    ) -> Result<AttachmentScanResult, ScanError> {
        let id = completion.scan_id;
        let updated = {
            let mut entry = self.results.get_mut(&id).ok_or(ScanError::NotFound(id))?;
            entry.transition(completion.status, completion.details)?;
            entry.clone()
        };

        metrics::record_scan_completion(updated.status.as_str());
        tracing::info!(scan_id = %id, status = %updated.status, "Applied scan completion");
        self.settle(&updated).await;
        Ok(updated)
    }

    /// Apply queued completions until `stop` fires or every sender is gone.
    /// On stop the queue is closed and what is already in it is applied.
    pub async fn run_completions(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<ScanCompletion>,
        mut stop: ShutdownSignal,
    ) {
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(completion) => self.apply_logged(completion).await,
                    None => return,
                },
                _ = stop.recv() => break,
            }
        }

        rx.close();
        let mut drained = 0usize;
        while let Some(completion) = rx.recv().await {
            self.apply_logged(completion).await;
            drained += 1;
        }
        tracing::debug!(drained, "Scan completion worker stopped");
    }

    async fn apply_logged(&self, completion: ScanCompletion) {
        if let Err(e) = self.apply_completion(completion).await {
            tracing::warn!(error = %e, "Dropped scan completion");
        }
    }

    /// React to a terminal result: purge infected objects, then notify.
    async fn settle(&self, result: &AttachmentScanResult) {
        if result.status == ScanStatus::Infected {
            if let Some(key) = result.object_key() {
                match self.objects.delete(key).await {
                    Ok(true) => tracing::warn!(scan_id = %result.id, object_key = %key, "Purged infected object"),
                    Ok(false) => tracing::debug!(scan_id = %result.id, object_key = %key, "Infected object already gone"),
                    Err(e) => tracing::error!(scan_id = %result.id, object_key = %key, error = %e, "Failed to purge infected object"),
                }
            }
        }
        self.publish(result);
    }

    fn publish(&self, result: &AttachmentScanResult) {
        let event = match result.status {
            ScanStatus::Clean => ScanEvent::Cleared(result.clone()),
            ScanStatus::Infected => ScanEvent::Infected(result.clone()),
            ScanStatus::Pending => return,
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::scanning::engine::StubScanEngine;
    use crate::scanning::store::InMemoryObjectStore;
    use crate::scanning::types::ScanVerdict;
    use async_trait::async_trait;
    use std::time::Duration;

    fn pipeline() -> (ContentSafetyPipeline, mpsc::Receiver<ScanCompletion>, Arc<InMemoryObjectStore>) {
        let objects = Arc::new(InMemoryObjectStore::new());
        let (pipeline, rx) = ContentSafetyPipeline::new(
            Arc::new(StubScanEngine),
            objects.clone(),
            &ScanConfig::default(),
        );
        (pipeline, rx, objects)
    }

    fn completion(id: Uuid, status: ScanStatus) -> ScanCompletion {
        ScanCompletion {
            scan_id: id,
            status,
            details: None,
        }
    }

    #[test]
    fn test_inline_is_clean_and_deliverable() {
        let (pipeline, _rx, _) = pipeline();
        let result = pipeline.scan_inline(b"%PDF-1.7", "contract.pdf");
        assert_eq!(result.status, ScanStatus::Clean);
        assert_eq!(result.engine, "stub");
        assert_eq!(
            result.attachment,
            AttachmentRef::Inline { filename: "contract.pdf".into(), size: 8 }
        );
        assert!(pipeline.ensure_deliverable(result.id).is_ok());
    }

    #[tokio::test]
    async fn test_reference_pending_until_completed() {
        let (pipeline, _rx, _) = pipeline();
        let result = pipeline.scan_by_reference("uploads/abc.jpg").await;
        assert_eq!(result.status, ScanStatus::Pending);
        assert_eq!(pipeline.ensure_deliverable(result.id), Err(ScanError::Pending(result.id)));

        let updated = pipeline
            .apply_completion(completion(result.id, ScanStatus::Clean))
            .await
            .unwrap();
        assert_eq!(updated.status, ScanStatus::Clean);
        assert!(pipeline.ensure_deliverable(result.id).is_ok());
    }

    #[tokio::test]
    async fn test_second_completion_rejected() {
        let (pipeline, _rx, _) = pipeline();
        let result = pipeline.scan_by_reference("uploads/a.png").await;
        pipeline
            .apply_completion(completion(result.id, ScanStatus::Clean))
            .await
            .unwrap();

        let err = pipeline
            .apply_completion(completion(result.id, ScanStatus::Infected))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidTransition { .. }));
        assert_eq!(pipeline.status(result.id).map(|r| r.status), Some(ScanStatus::Clean));
    }

    #[tokio::test]
    async fn test_unknown_scan_id() {
        let (pipeline, _rx, _) = pipeline();
        let id = Uuid::new_v4();
        assert_eq!(pipeline.ensure_deliverable(id), Err(ScanError::NotFound(id)));
        assert_eq!(
            pipeline.apply_completion(completion(id, ScanStatus::Clean)).await,
            Err(ScanError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn test_infected_object_purged_and_announced() {
        let (pipeline, _rx, objects) = pipeline();
        objects.put("uploads/bad.exe", vec![0x4d, 0x5a]);
        let mut events = pipeline.subscribe();

        let result = pipeline.scan_by_reference("uploads/bad.exe").await;
        let mut done = completion(result.id, ScanStatus::Infected);
        done.details = Some("Win.Test.EICAR_HDB-1".into());
        pipeline.apply_completion(done).await.unwrap();

        assert!(!objects.contains("uploads/bad.exe"));
        match events.recv().await.unwrap() {
            ScanEvent::Infected(r) => {
                assert_eq!(r.id, result.id);
                assert_eq!(r.details.as_deref(), Some("Win.Test.EICAR_HDB-1"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(pipeline.ensure_deliverable(result.id), Err(ScanError::Infected(result.id)));
    }

    #[tokio::test]
    async fn test_worker_applies_queued_completions() {
        let (pipeline, rx, _) = pipeline();
        let pipeline = Arc::new(pipeline);
        let shutdown = Shutdown::new();
        let worker = tokio::spawn(pipeline.clone().run_completions(rx, shutdown.subscribe()));

        let mut events = pipeline.subscribe();
        let result = pipeline.scan_by_reference("uploads/doc.pdf").await;
        pipeline
            .submit_completion(completion(result.id, ScanStatus::Clean))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, ScanEvent::Cleared(pipeline.status(result.id).unwrap()));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_drains_queue_on_stop() {
        let (pipeline, rx, _) = pipeline();
        let pipeline = Arc::new(pipeline);
        let first = pipeline.scan_by_reference("uploads/1.pdf").await;
        let second = pipeline.scan_by_reference("uploads/2.pdf").await;
        pipeline
            .submit_completion(completion(first.id, ScanStatus::Clean))
            .await
            .unwrap();
        pipeline
            .submit_completion(completion(second.id, ScanStatus::Infected))
            .await
            .unwrap();

        let stop = Shutdown::new();
        stop.trigger();
        tokio::time::timeout(
            Duration::from_secs(1),
            pipeline.clone().run_completions(rx, stop.subscribe()),
        )
        .await
        .unwrap();

        assert_eq!(pipeline.status(first.id).map(|r| r.status), Some(ScanStatus::Clean));
        assert_eq!(pipeline.status(second.id).map(|r| r.status), Some(ScanStatus::Infected));
        assert_eq!(
            pipeline.submit_completion(completion(first.id, ScanStatus::Clean)).await,
            Err(ScanError::QueueClosed)
        );
    }

    #[tokio::test]
    async fn test_sweep_settled_keeps_pending_and_recent() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let config = ScanConfig {
            result_ttl_secs: 60,
            ..ScanConfig::default()
        };
        let (pipeline, _rx) = ContentSafetyPipeline::new(Arc::new(StubScanEngine), objects, &config);

        for i in 0..1000 {
            pipeline.scan_inline(b"hello", &format!("note-{}.txt", i));
        }
        let pending = pipeline.scan_by_reference("uploads/slow.bin").await;
        assert_eq!(pipeline.len(), 1001);

        let now = Utc::now();
        assert_eq!(pipeline.sweep_settled(now), 0);
        assert_eq!(pipeline.sweep_settled(now + chrono::Duration::seconds(61)), 1000);
        assert_eq!(pipeline.len(), 1);
        assert!(pipeline.status(pending.id).is_some());
    }

    struct RejectingEngine;

    #[async_trait]
    impl ScanEngine for RejectingEngine {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn scan_inline(&self, _buffer: &[u8], _filename: &str) -> ScanVerdict {
            ScanVerdict::infected("always")
        }

        async fn scan_by_reference(&self, _object_key: &str) -> ScanVerdict {
            ScanVerdict::infected("always")
        }
    }

    #[tokio::test]
    async fn test_synchronous_infected_reference_is_purged() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.put("k", vec![1]);
        let (pipeline, _rx) =
            ContentSafetyPipeline::new(Arc::new(RejectingEngine), objects.clone(), &ScanConfig::default());

        let result = pipeline.scan_by_reference("k").await;
        assert_eq!(result.status, ScanStatus::Infected);
        assert!(result.completed_at.is_some());
        assert!(!objects.contains("k"));

        let inline = pipeline.scan_inline(b"x", "x.bin");
        assert!(!inline.is_deliverable());
    }
}
