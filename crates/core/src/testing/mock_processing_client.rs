//! Mock processing client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::client::{ProcessingClient, ProcessingError, ProcessingRequest, ProcessingResult};
use crate::item::ItemId;

/// A recorded remote call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The item that was processed.
    pub item_id: ItemId,
    /// Stored file sent along, if any.
    pub path: Option<PathBuf>,
    /// When the call was made.
    pub timestamp: Instant,
}

/// Invoked at the start of every call, before any delay.
type CallHook = Box<dyn Fn(&ItemId) + Send + Sync>;

/// Mock implementation of the ProcessingClient trait.
///
/// Provides controllable behavior for testing:
/// - Script a success payload or an error per item id
/// - Track calls in order for assertions
/// - Simulate slow calls and observe call overlap
///
/// # Example
///
/// ```rust,ignore
/// use qform_core::testing::MockProcessingClient;
///
/// let client = MockProcessingClient::new();
/// client.fail_item("f2", ProcessingError::Transport("refused".into())).await;
///
/// processor.run(vec!["f1".into(), "f2".into()]).await;
///
/// assert_eq!(client.called_ids().await, vec!["f1".into(), "f2".into()]);
/// assert_eq!(client.max_concurrent_calls(), 1);
/// ```
#[derive(Clone)]
pub struct MockProcessingClient {
    /// Per-item scripted outcomes.
    outcomes: Arc<RwLock<HashMap<ItemId, Result<ProcessingResult, ProcessingError>>>>,
    /// Returned for items without a scripted outcome.
    default_result: Arc<RwLock<ProcessingResult>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<ProcessingError>>>,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Simulated call duration.
    delay: Arc<RwLock<Duration>>,
    call_hook: Arc<RwLock<Option<CallHook>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockProcessingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProcessingClient")
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("max_in_flight", &self.max_in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for MockProcessingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessingClient {
    /// Create a mock client where every call succeeds with no flowchart payload.
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(RwLock::new(HashMap::new())),
            default_result: Arc::new(RwLock::new(ProcessingResult::new("success"))),
            next_error: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            call_hook: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make calls for `id` succeed with `result`.
    pub async fn succeed_item(&self, id: impl Into<ItemId>, result: ProcessingResult) {
        self.outcomes.write().await.insert(id.into(), Ok(result));
    }

    /// Make calls for `id` fail with `error`.
    pub async fn fail_item(&self, id: impl Into<ItemId>, error: ProcessingError) {
        self.outcomes.write().await.insert(id.into(), Err(error));
    }

    /// Set the result returned for items without a scripted outcome.
    pub async fn set_default_result(&self, result: ProcessingResult) {
        *self.default_result.write().await = result;
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: ProcessingError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated duration of each call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Run `hook` at the start of every call.
    pub async fn set_call_hook<F>(&self, hook: F)
    where
        F: Fn(&ItemId) + Send + Sync + 'static,
    {
        *self.call_hook.write().await = Some(Box::new(hook));
    }

    /// Get recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Ids in call order.
    pub async fn called_ids(&self) -> Vec<ItemId> {
        self.calls
            .read()
            .await
            .iter()
            .map(|c| c.item_id.clone())
            .collect()
    }

    /// Get the number of calls made.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn outcome_for(&self, id: &ItemId) -> Result<ProcessingResult, ProcessingError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        match self.outcomes.read().await.get(id) {
            Some(outcome) => outcome.clone(),
            None => Ok(self.default_result.read().await.clone()),
        }
    }
}

#[async_trait]
impl ProcessingClient for MockProcessingClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process_item(
        &self,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult, ProcessingError> {
        let id = &request.id;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.calls.write().await.push(RecordedCall {
            item_id: id.clone(),
            path: request.path.clone(),
            timestamp: Instant::now(),
        });

        if let Some(hook) = self.call_hook.read().await.as_ref() {
            hook(id);
        }

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.outcome_for(id).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ProcessingRequest {
        ProcessingRequest::new(id, format!("{}.xml", id))
    }

    #[tokio::test]
    async fn test_default_success() {
        let client = MockProcessingClient::new();
        let result = client.process_item(&request("a")).await.unwrap();
        assert_eq!(result.message, "success");
        assert!(result.flowcharts.is_empty());
        assert_eq!(client.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let client = MockProcessingClient::new();
        client
            .fail_item("bad", ProcessingError::Transport("refused".into()))
            .await;
        client
            .succeed_item(
                "good",
                ProcessingResult::new("ok").with_flowcharts(vec!["x".into()]),
            )
            .await;

        assert!(client.process_item(&request("bad")).await.is_err());
        let good = client.process_item(&request("good")).await.unwrap();
        assert_eq!(good.flowcharts.len(), 1);
        assert_eq!(
            client.called_ids().await,
            vec![ItemId::from("bad"), ItemId::from("good")]
        );
    }

    #[tokio::test]
    async fn test_next_error_is_one_shot() {
        let client = MockProcessingClient::new();
        client
            .set_next_error(ProcessingError::InvalidResponse("garbage".into()))
            .await;

        assert!(client.process_item(&request("a")).await.is_err());
        assert!(client.process_item(&request("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_tracks_overlapping_calls() {
        let client = MockProcessingClient::new();
        client.set_delay(Duration::from_millis(20)).await;

        let a = client.clone();
        let b = client.clone();
        let (req_a, req_b) = (request("a"), request("b"));
        let _ = tokio::join!(a.process_item(&req_a), b.process_item(&req_b));

        assert_eq!(client.max_concurrent_calls(), 2);
    }

    #[tokio::test]
    async fn test_records_stored_path() {
        let client = MockProcessingClient::new();
        client
            .process_item(&request("a").with_path("/uploads/a.xml"))
            .await
            .unwrap();
        let calls = client.recorded_calls().await;
        assert_eq!(calls[0].path, Some(PathBuf::from("/uploads/a.xml")));
    }
}
