//! Item registry trait and errors.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::broadcast;

use super::types::{Artifact, Item, ItemEvent, ItemId, ItemStatus};

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Item not found.
    #[error("item not found: {0}")]
    NotFound(ItemId),

    /// An item with this id is already registered.
    #[error("item already registered: {0}")]
    AlreadyExists(ItemId),

    /// Status update not allowed by the item state machine.
    #[error("cannot move item {item_id} from {from} to {to}")]
    InvalidTransition {
        item_id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },

    /// Another item is already processing.
    #[error("cannot start {item_id}: item {processing} is already processing")]
    AlreadyProcessing { item_id: ItemId, processing: ItemId },

    /// Artifacts may only be attached to succeeded items.
    #[error("cannot attach artifacts to item {item_id} in status {status}")]
    ArtifactsNotAllowed { item_id: ItemId, status: ItemStatus },

    /// The item is being processed and cannot be modified this way.
    #[error("item {0} is processing")]
    Busy(ItemId),

    /// Internal lock was poisoned by a panicking writer.
    #[error("registry lock poisoned")]
    LockPoisoned,
}

/// Shared, ordered collection of known items.
///
/// The processor is the only writer of status and artifacts during a run;
/// the upload store is the only writer of new items.
pub trait ItemRegistry: Send + Sync {
    /// Insert a new item with status `Uploaded` and no artifacts.
    fn register(&self, id: ItemId, display_name: &str) -> Result<Item, RegistryError>;

    /// Get an item by id.
    fn get(&self, id: &ItemId) -> Result<Option<Item>, RegistryError>;

    /// All items in insertion order.
    fn list(&self) -> Result<Vec<Item>, RegistryError>;

    /// Snapshot of the ids still in `Uploaded`, in insertion order.
    fn list_pending_ids(&self) -> Result<Vec<ItemId>, RegistryError>;

    /// Move an item to a new status.
    fn set_status(&self, id: &ItemId, status: ItemStatus) -> Result<Item, RegistryError>;

    /// Replace the artifacts of a succeeded item.
    fn set_artifacts(&self, id: &ItemId, artifacts: Vec<Artifact>) -> Result<Item, RegistryError>;

    /// Put a finished item back to `Uploaded` so the next run picks it up.
    fn resubmit(&self, id: &ItemId) -> Result<Item, RegistryError>;

    /// Remove an item. Rejected while the item is processing.
    fn remove(&self, id: &ItemId) -> Result<Item, RegistryError>;

    /// Number of items per status.
    fn count_by_status(&self) -> Result<HashMap<ItemStatus, usize>, RegistryError>;

    /// Receive change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ItemEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::NotFound(ItemId::from("f1"));
        assert_eq!(err.to_string(), "item not found: f1");

        let err = RegistryError::InvalidTransition {
            item_id: ItemId::from("f1"),
            from: ItemStatus::Uploaded,
            to: ItemStatus::Succeeded,
        };
        assert_eq!(
            err.to_string(),
            "cannot move item f1 from uploaded to succeeded"
        );

        let err = RegistryError::AlreadyProcessing {
            item_id: ItemId::from("f2"),
            processing: ItemId::from("f1"),
        };
        assert_eq!(
            err.to_string(),
            "cannot start f2: item f1 is already processing"
        );
    }
}
