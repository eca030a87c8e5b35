//! Processor configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the sequential processor and its run queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Enable/disable the run queue worker.
    /// When disabled, "process all" requests are rejected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Run over every pending item once at startup.
    #[serde(default)]
    pub process_on_startup: bool,

    /// Artifacts derived for a successful item whose response carries no
    /// flowchart payload.
    #[serde(default = "default_artifact_count")]
    pub default_artifact_count: usize,

    /// Route prefix used to build artifact links.
    #[serde(default = "default_artifact_route")]
    pub artifact_route: String,

    /// Runs that may wait behind the active one.
    #[serde(default = "default_max_pending_runs")]
    pub max_pending_runs: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_artifact_count() -> usize {
    3
}

fn default_artifact_route() -> String {
    "flowchart".to_string()
}

fn default_max_pending_runs() -> usize {
    16
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            process_on_startup: false,
            default_artifact_count: default_artifact_count(),
            artifact_route: default_artifact_route(),
            max_pending_runs: default_max_pending_runs(),
        }
    }
}
