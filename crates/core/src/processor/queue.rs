//! Run queue in front of the sequential processor.
//!
//! Requests to process items are accepted without waiting and executed one
//! run at a time by a single background worker, in submission order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::item::{ItemId, ItemRegistry};

use super::config::ProcessorConfig;
use super::runner::{RunSummary, SequentialProcessor};
use super::types::{ProcessorError, ProcessorStatus};

struct RunRequest {
    run_id: u64,
    ids: Vec<ItemId>,
    done: oneshot::Sender<RunSummary>,
}

/// Handle to a submitted run.
#[derive(Debug)]
pub struct RunTicket {
    pub run_id: u64,
    done: oneshot::Receiver<RunSummary>,
}

impl RunTicket {
    /// Wait for the run to finish.
    ///
    /// Returns `None` when the queue was stopped before the run started.
    pub async fn wait(self) -> Option<RunSummary> {
        self.done.await.ok()
    }
}

/// Serializes processing runs behind a single worker.
pub struct ProcessingQueue {
    config: ProcessorConfig,
    processor: Arc<SequentialProcessor>,
    registry: Arc<dyn ItemRegistry>,

    // Runtime state
    running: Arc<AtomicBool>,
    sender: RwLock<Option<mpsc::Sender<RunRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ProcessingQueue {
    pub fn new(
        config: ProcessorConfig,
        processor: Arc<SequentialProcessor>,
        registry: Arc<dyn ItemRegistry>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            processor,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            sender: RwLock::new(None),
            worker: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Start the worker. Does nothing when disabled or already running.
    pub async fn start(&self) {
        if !self.config.enabled {
            info!("Processing queue disabled by configuration");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Processing queue already running");
            return;
        }

        let (tx, rx) = mpsc::channel(self.config.max_pending_runs.max(1));
        *self.sender.write().await = Some(tx);
        *self.worker.lock().await = Some(self.spawn_worker(rx));

        info!(
            "Processing queue started (max {} pending runs)",
            self.config.max_pending_runs
        );
    }

    /// Stop the worker. The active run finishes; runs not yet started are
    /// dropped.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Processing queue not running");
            return;
        }

        info!("Stopping processing queue");

        self.sender.write().await.take();
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.worker.lock().await.take() {
            // Give the active item a moment to finish
            if tokio::time::timeout(Duration::from_millis(500), handle)
                .await
                .is_err()
            {
                debug!("Processing worker still finishing its current run");
            }
        }

        info!("Processing queue stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Queue a run over `ids` and return immediately.
    pub async fn submit(&self, ids: Vec<ItemId>) -> Result<RunTicket, ProcessorError> {
        let sender = self
            .sender
            .read()
            .await
            .clone()
            .ok_or(ProcessorError::NotRunning)?;

        let run_id = self.processor.next_run_id();
        let (done_tx, done_rx) = oneshot::channel();
        let count = ids.len();

        sender
            .try_send(RunRequest {
                run_id,
                ids,
                done: done_tx,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    ProcessorError::QueueFull(sender.max_capacity())
                }
                mpsc::error::TrySendError::Closed(_) => ProcessorError::NotRunning,
            })?;

        debug!("Run {} queued with {} items", run_id, count);
        Ok(RunTicket {
            run_id,
            done: done_rx,
        })
    }

    /// Queue a run over every item currently pending.
    ///
    /// Items registered after this call are not part of the run.
    pub async fn process_pending(&self) -> Result<RunTicket, ProcessorError> {
        let ids = self.registry.list_pending_ids()?;
        info!("Processing {} pending items", ids.len());
        self.submit(ids).await
    }

    pub async fn status(&self) -> ProcessorStatus {
        let pending_runs = self
            .sender
            .read()
            .await
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);
        let stats = &self.processor.stats;

        ProcessorStatus {
            running: self.is_running(),
            active_run: self.processor.active_run().await,
            pending_runs,
            runs_completed: stats.runs_completed.load(Ordering::Relaxed),
            items_succeeded: stats.items_succeeded.load(Ordering::Relaxed),
            items_failed: stats.items_failed.load(Ordering::Relaxed),
            items_skipped: stats.items_skipped.load(Ordering::Relaxed),
        }
    }

    fn spawn_worker(&self, mut rx: mpsc::Receiver<RunRequest>) -> JoinHandle<()> {
        let processor = Arc::clone(&self.processor);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Processing worker started");
            loop {
                tokio::select! {
                    // Shutdown wins over runs that are already queued
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("Processing worker received shutdown signal");
                        break;
                    }
                    request = rx.recv() => {
                        let Some(request) = request else {
                            break;
                        };
                        let summary = processor.execute(request.run_id, request.ids).await;
                        let _ = request.done.send(summary);
                    }
                }
            }

            rx.close();
            let mut dropped = 0;
            while let Ok(request) = rx.try_recv() {
                debug!("Dropping run {} queued before shutdown", request.run_id);
                dropped += 1;
            }
            if dropped > 0 {
                info!("Dropped {} queued runs", dropped);
            }
            info!("Processing worker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{InMemoryItemRegistry, ItemStatus};
    use crate::processor::ArtifactPolicy;
    use crate::testing::MockProcessingClient;

    fn setup(config: ProcessorConfig) -> (Arc<InMemoryItemRegistry>, ProcessingQueue) {
        let registry = Arc::new(InMemoryItemRegistry::new());
        let processor = Arc::new(SequentialProcessor::new(
            Arc::clone(&registry) as Arc<dyn ItemRegistry>,
            Arc::new(MockProcessingClient::new()),
            ArtifactPolicy::default(),
        ));
        let queue = ProcessingQueue::new(
            config,
            processor,
            Arc::clone(&registry) as Arc<dyn ItemRegistry>,
        );
        (registry, queue)
    }

    #[tokio::test]
    async fn test_submit_requires_running() {
        let (_registry, queue) = setup(ProcessorConfig::default());
        let result = queue.submit(vec!["a".into()]).await;
        assert!(matches!(result, Err(ProcessorError::NotRunning)));
    }

    #[tokio::test]
    async fn test_disabled_queue_never_starts() {
        let config = ProcessorConfig {
            enabled: false,
            ..Default::default()
        };
        let (_registry, queue) = setup(config);
        queue.start().await;
        assert!(!queue.is_running());
        assert!(queue.process_pending().await.is_err());
    }

    #[tokio::test]
    async fn test_process_pending_runs_snapshot() {
        let (registry, queue) = setup(ProcessorConfig::default());
        registry.register("a".into(), "a.xml").unwrap();
        registry.register("b".into(), "b.xml").unwrap();
        queue.start().await;

        let summary = queue.process_pending().await.unwrap().wait().await.unwrap();

        assert_eq!(summary.succeeded, 2);
        for id in ["a", "b"] {
            let item = registry.get(&id.into()).unwrap().unwrap();
            assert_eq!(item.status, ItemStatus::Succeeded);
        }

        let status = queue.status().await;
        assert!(status.running);
        assert_eq!(status.runs_completed, 1);
        assert_eq!(status.items_succeeded, 2);
        assert_eq!(status.pending_runs, 0);

        queue.stop().await;
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (registry, queue) = setup(ProcessorConfig::default());
        registry.register("a".into(), "a.xml").unwrap();

        queue.start().await;
        queue.stop().await;
        assert!(queue.submit(vec!["a".into()]).await.is_err());

        queue.start().await;
        let summary = queue.submit(vec!["a".into()]).await.unwrap().wait().await;
        assert_eq!(summary.map(|s| s.succeeded), Some(1));
        queue.stop().await;
    }
}
