//! Item registry: the ordered set of uploaded items and their status.

mod memory;
mod registry;
mod types;

pub use memory::InMemoryItemRegistry;
pub use registry::{ItemRegistry, RegistryError};
pub use types::{Artifact, Item, ItemEvent, ItemId, ItemStatus};
