//! Artifact derivation for successfully processed items.

use crate::client::ProcessingResult;
use crate::item::{Artifact, ItemId};

use super::config::ProcessorConfig;

/// Derives artifact references from an item's own processing result.
///
/// The count is the length of the flowchart payload when the response
/// carries one, otherwise the configured default. References are keyed by
/// ordinal: `<route>/<id>_<ordinal>`.
#[derive(Debug, Clone)]
pub struct ArtifactPolicy {
    default_count: usize,
    route: String,
}

impl ArtifactPolicy {
    pub fn new(default_count: usize, route: impl Into<String>) -> Self {
        Self {
            default_count,
            route: route.into().trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self::new(config.default_artifact_count, config.artifact_route.clone())
    }

    /// Route segment artifact links start with.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn count_for(&self, result: &ProcessingResult) -> usize {
        if result.flowcharts.is_empty() {
            self.default_count
        } else {
            result.flowcharts.len()
        }
    }

    pub fn derive(&self, id: &ItemId, result: &ProcessingResult) -> Vec<Artifact> {
        (0..self.count_for(result))
            .map(|ordinal| Artifact {
                ordinal,
                href: format!("{}/{}", self.route, Self::key(id, ordinal)),
                source: result.view_location(ordinal),
            })
            .collect()
    }

    /// Last path segment of an artifact link.
    pub fn key(id: &ItemId, ordinal: usize) -> String {
        format!("{}_{}", id, ordinal)
    }

    /// Split an artifact key on its last `_` into item id and ordinal.
    pub fn parse_key(key: &str) -> Option<(ItemId, usize)> {
        let (id, ordinal) = key.rsplit_once('_')?;
        if id.is_empty() {
            return None;
        }
        let ordinal = ordinal.parse().ok()?;
        Some((ItemId::from(id), ordinal))
    }
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self::from_config(&ProcessorConfig::default())
    }
}
