//! Sequential processor implementation.
//!
//! A run is an explicit iterative consumer of a work queue: the id snapshot
//! handed to [`SequentialProcessor::run`] is drained front to back, with
//! exactly one remote call outstanding at any time. A failing item is marked
//! `Failed` and the run moves on; nothing is retried and nothing aborts the
//! run.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::client::{ProcessingClient, ProcessingRequest};
use crate::item::{ItemId, ItemRegistry, ItemStatus};
use crate::metrics::{ITEMS_PROCESSED, PROCESSING_DURATION, PROCESSING_ERRORS, RUNS_COMPLETED};
use crate::upload::UploadStore;

use super::artifacts::ArtifactPolicy;
use super::types::{ItemOutcome, RunStatus};

/// Counts for one finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ProcessorStats {
    pub runs_completed: AtomicU64,
    pub items_succeeded: AtomicU64,
    pub items_failed: AtomicU64,
    pub items_skipped: AtomicU64,
}

/// Drives items through the remote processing client one at a time.
pub struct SequentialProcessor {
    registry: Arc<dyn ItemRegistry>,
    client: Arc<dyn ProcessingClient>,
    artifacts: ArtifactPolicy,
    /// Stored uploads sent along with each call.
    files: Option<Arc<UploadStore>>,
    /// Held for the whole duration of a run.
    run_lock: Mutex<()>,
    next_run_id: AtomicU64,
    active_run: RwLock<Option<RunStatus>>,
    pub(crate) stats: ProcessorStats,
}

impl SequentialProcessor {
    pub fn new(
        registry: Arc<dyn ItemRegistry>,
        client: Arc<dyn ProcessingClient>,
        artifacts: ArtifactPolicy,
    ) -> Self {
        Self {
            registry,
            client,
            artifacts,
            files: None,
            run_lock: Mutex::new(()),
            next_run_id: AtomicU64::new(1),
            active_run: RwLock::new(None),
            stats: ProcessorStats::default(),
        }
    }

    /// Send each item's stored file to the processing service.
    pub fn with_files(mut self, files: Arc<UploadStore>) -> Self {
        self.files = Some(files);
        self
    }

    /// Process `ids` in order. Outcomes are observed through the registry.
    pub async fn run(&self, ids: Vec<ItemId>) {
        let run_id = self.next_run_id();
        self.execute(run_id, ids).await;
    }

    /// Reserve an id for a run that will be executed later.
    pub(crate) fn next_run_id(&self) -> u64 {
        self.next_run_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Progress of the run currently executing.
    pub async fn active_run(&self) -> Option<RunStatus> {
        self.active_run.read().await.clone()
    }

    pub(crate) async fn execute(&self, run_id: u64, ids: Vec<ItemId>) -> RunSummary {
        let mut summary = RunSummary {
            run_id,
            ..Default::default()
        };

        if ids.is_empty() {
            debug!("Run {} has no items", run_id);
            return summary;
        }

        // Runs never overlap, so neither do their remote calls
        let _guard = self.run_lock.lock().await;

        let mut queue: VecDeque<ItemId> = ids.into();
        let total = queue.len();
        info!("Run {} started with {} items", run_id, total);

        *self.active_run.write().await = Some(RunStatus {
            run_id,
            total,
            completed: 0,
            current_item: None,
            started_at: Utc::now(),
        });

        while let Some(id) = queue.pop_front() {
            self.set_current(Some(id.clone())).await;

            let outcome = self.process_one(&id).await;
            summary.record(outcome);
            self.record_outcome(outcome);

            if let Some(status) = self.active_run.write().await.as_mut() {
                status.completed += 1;
                status.current_item = None;
            }
        }

        *self.active_run.write().await = None;
        self.stats.runs_completed.fetch_add(1, Ordering::Relaxed);
        RUNS_COMPLETED.inc();

        info!(
            "Run {} finished: {} succeeded, {} failed, {} skipped",
            run_id, summary.succeeded, summary.failed, summary.skipped
        );
        summary
    }

    async fn set_current(&self, id: Option<ItemId>) {
        if let Some(status) = self.active_run.write().await.as_mut() {
            status.current_item = id;
        }
    }

    fn record_outcome(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Succeeded => &self.stats.items_succeeded,
            ItemOutcome::Failed => &self.stats.items_failed,
            ItemOutcome::Skipped => &self.stats.items_skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        ITEMS_PROCESSED.with_label_values(&[outcome.as_str()]).inc();
    }

    /// One remote call for one item, start to terminal status.
    async fn process_one(&self, id: &ItemId) -> ItemOutcome {
        let item = match self.registry.set_status(id, ItemStatus::Processing) {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping item {}: {}", id, e);
                return ItemOutcome::Skipped;
            }
        };

        let mut request = ProcessingRequest::new(id.clone(), item.display_name);
        if let Some(files) = &self.files {
            request.path = files.path(id).await;
        }

        debug!("Processing item {} via {} client", id, self.client.name());
        let started = Instant::now();
        let result = self.client.process_item(&request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(result) => {
                PROCESSING_DURATION
                    .with_label_values(&["succeeded"])
                    .observe(elapsed);

                if let Err(e) = self.registry.set_status(id, ItemStatus::Succeeded) {
                    error!("Failed to mark item {} succeeded: {}", id, e);
                    return ItemOutcome::Failed;
                }

                let artifacts = self.artifacts.derive(id, &result);
                let count = artifacts.len();
                if let Err(e) = self.registry.set_artifacts(id, artifacts) {
                    error!("Failed to store artifacts for item {}: {}", id, e);
                }

                info!("Item {} processed: {} artifacts", id, count);
                ItemOutcome::Succeeded
            }
            Err(e) => {
                PROCESSING_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                PROCESSING_ERRORS.with_label_values(&[e.kind()]).inc();
                warn!("Item {} failed ({}): {}", id, e.kind(), e);

                if let Err(e) = self.registry.set_status(id, ItemStatus::Failed) {
                    error!("Failed to mark item {} failed: {}", id, e);
                }
                ItemOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ProcessingError, ProcessingResult};
    use crate::config::UploadConfig;
    use crate::testing::MockProcessingClient;
    use crate::item::InMemoryItemRegistry;
    use async_trait::async_trait;

    /// Fails every id starting with "bad".
    struct PrefixClient;

    #[async_trait]
    impl ProcessingClient for PrefixClient {
        fn name(&self) -> &str {
            "prefix"
        }

        async fn process_item(
            &self,
            request: &ProcessingRequest,
        ) -> Result<ProcessingResult, ProcessingError> {
            if request.id.as_str().starts_with("bad") {
                Err(ProcessingError::Transport("connection refused".into()))
            } else {
                Ok(ProcessingResult::new("success"))
            }
        }
    }

    fn setup(ids: &[&str]) -> (Arc<InMemoryItemRegistry>, SequentialProcessor) {
        let registry = Arc::new(InMemoryItemRegistry::new());
        for id in ids {
            registry.register(ItemId::from(*id), id).unwrap();
        }
        let processor = SequentialProcessor::new(
            Arc::clone(&registry) as Arc<dyn ItemRegistry>,
            Arc::new(PrefixClient),
            ArtifactPolicy::default(),
        );
        (registry, processor)
    }

    fn status(registry: &InMemoryItemRegistry, id: &str) -> ItemStatus {
        registry.get(&ItemId::from(id)).unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_empty_run_is_noop() {
        let (registry, processor) = setup(&["a"]);
        let mut rx = registry.subscribe();

        let summary = processor.execute(1, vec![]).await;

        assert_eq!(summary, RunSummary { run_id: 1, ..Default::default() });
        assert!(rx.try_recv().is_err());
        assert_eq!(status(&registry, "a"), ItemStatus::Uploaded);
        assert_eq!(processor.stats.runs_completed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_run() {
        let (registry, processor) = setup(&["bad1", "ok1", "ok2"]);

        processor
            .run(vec!["bad1".into(), "ok1".into(), "ok2".into()])
            .await;

        assert_eq!(status(&registry, "bad1"), ItemStatus::Failed);
        assert_eq!(status(&registry, "ok1"), ItemStatus::Succeeded);
        assert_eq!(status(&registry, "ok2"), ItemStatus::Succeeded);
        assert!(registry
            .get(&ItemId::from("bad1"))
            .unwrap()
            .unwrap()
            .artifacts
            .is_empty());
        assert_eq!(
            registry.get(&ItemId::from("ok1")).unwrap().unwrap().artifacts.len(),
            3
        );
    }

    #[tokio::test]
    async fn test_unknown_item_is_skipped() {
        let (registry, processor) = setup(&["a"]);

        let summary = processor
            .execute(7, vec!["ghost".into(), "a".into()])
            .await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(status(&registry, "a"), ItemStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_stats_and_active_run_cleared() {
        let (_registry, processor) = setup(&["a", "bad"]);

        processor.run(vec!["a".into(), "bad".into()]).await;

        assert!(processor.active_run().await.is_none());
        assert_eq!(processor.stats.runs_completed.load(Ordering::Relaxed), 1);
        assert_eq!(processor.stats.items_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(processor.stats.items_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_stored_file_sent_with_call() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = Arc::new(InMemoryItemRegistry::new());
        let config = UploadConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let files = Arc::new(UploadStore::new(
            config,
            Arc::clone(&registry) as Arc<dyn ItemRegistry>,
        ));
        let item = files.accept("survey.xml", b"<q/>").await.unwrap();

        let client = MockProcessingClient::new();
        let processor = SequentialProcessor::new(
            Arc::clone(&registry) as Arc<dyn ItemRegistry>,
            Arc::new(client.clone()),
            ArtifactPolicy::default(),
        )
        .with_files(Arc::clone(&files));

        processor.run(vec![item.id.clone()]).await;

        let calls = client.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, files.path(&item.id).await);
        assert!(calls[0].path.is_some());
    }

    #[tokio::test]
    async fn test_run_ids_increase() {
        let (_registry, processor) = setup(&[]);
        let first = processor.next_run_id();
        let second = processor.next_run_id();
        assert!(second > first);
    }
}
