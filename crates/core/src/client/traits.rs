//! Trait definitions for the processing client.

use async_trait::async_trait;

use super::error::ProcessingError;
use super::types::{ProcessingRequest, ProcessingResult};

/// Performs the remote processing of one item.
#[async_trait]
pub trait ProcessingClient: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Process a single item. Resolves once the remote side has answered.
    async fn process_item(
        &self,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult, ProcessingError>;
}
