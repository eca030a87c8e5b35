//! Types for the processor module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{ItemId, RegistryError};

/// Errors returned by the run queue. A run itself never fails.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The run queue worker is not running.
    #[error("processing queue is not running")]
    NotRunning,

    /// Too many runs are already waiting.
    #[error("processing queue is full ({0} runs pending)")]
    QueueFull(usize),

    /// Reading the pending ids failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Final outcome of one item within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded,
    Failed,
    /// The item could not be moved to `Processing` (removed, or another
    /// item already processing). No remote call was made.
    Skipped,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Succeeded => "succeeded",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Skipped => "skipped",
        }
    }
}

/// Progress of the run currently executing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: u64,
    pub total: usize,
    pub completed: usize,
    /// Item whose remote call is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<ItemId>,
    pub started_at: DateTime<Utc>,
}

/// Current status of the run queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorStatus {
    /// Whether the worker is running.
    pub running: bool,
    /// The run being executed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_run: Option<RunStatus>,
    /// Runs waiting behind the active one.
    pub pending_runs: usize,
    /// Runs finished since startup.
    pub runs_completed: u64,
    /// Items that reached `Succeeded` since startup.
    pub items_succeeded: u64,
    /// Items that reached `Failed` since startup.
    pub items_failed: u64,
    /// Items skipped since startup.
    pub items_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default() {
        let status = ProcessorStatus::default();
        assert!(!status.running);
        assert!(status.active_run.is_none());
        assert_eq!(status.pending_runs, 0);
    }

    #[test]
    fn test_status_serialization_skips_idle_run() {
        let json = serde_json::to_value(ProcessorStatus::default()).unwrap();
        assert!(json.get("active_run").is_none());
        assert_eq!(json["runs_completed"], 0);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProcessorError::NotRunning.to_string(),
            "processing queue is not running"
        );
        assert_eq!(
            ProcessorError::QueueFull(4).to_string(),
            "processing queue is full (4 runs pending)"
        );
    }
}
