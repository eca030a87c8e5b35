//! In-memory item registry.
//!
//! Items live for the lifetime of the process. Every mutation goes through
//! [`InMemoryItemRegistry::apply`], which validates the change against the
//! item state machine, enforces the single-flight and artifact invariants,
//! stamps `updated_at` and publishes the resulting events.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::registry::{ItemRegistry, RegistryError};
use super::types::{Artifact, Item, ItemEvent, ItemId, ItemStatus};

/// Default capacity of the event channel.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct RegistryState {
    order: Vec<ItemId>,
    items: HashMap<ItemId, Item>,
    /// The item currently in `Processing`, if any.
    processing: Option<ItemId>,
}

/// A change to an existing item.
#[derive(Debug)]
enum Mutation {
    Status(ItemStatus),
    Artifacts(Vec<Artifact>),
    Resubmit,
}

/// Registry backed by a `RwLock`-guarded map plus insertion order.
#[derive(Debug)]
pub struct InMemoryItemRegistry {
    state: RwLock<RegistryState>,
    events: broadcast::Sender<ItemEvent>,
}

impl Default for InMemoryItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryItemRegistry {
    pub fn new() -> Self {
        Self::with_event_capacity(EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(RegistryState::default()),
            events,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, RegistryError> {
        self.state.read().map_err(|_| RegistryError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, RegistryError> {
        self.state.write().map_err(|_| RegistryError::LockPoisoned)
    }

    fn publish(&self, events: Vec<ItemEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    /// Apply a mutation to an existing item.
    fn apply(&self, id: &ItemId, mutation: Mutation) -> Result<Item, RegistryError> {
        let mut events = Vec::new();
        let item = {
            let mut guard = self.write()?;
            let state = &mut *guard;
            let item = state
                .items
                .get_mut(id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

            match mutation {
                Mutation::Status(next) => {
                    let from = item.status;
                    if !from.can_transition_to(next) {
                        return Err(RegistryError::InvalidTransition {
                            item_id: id.clone(),
                            from,
                            to: next,
                        });
                    }

                    if next == ItemStatus::Processing {
                        if let Some(current) = &state.processing {
                            return Err(RegistryError::AlreadyProcessing {
                                item_id: id.clone(),
                                processing: current.clone(),
                            });
                        }
                        state.processing = Some(id.clone());
                    } else {
                        state.processing = None;
                    }

                    // Artifacts only survive on a succeeded item
                    if next != ItemStatus::Succeeded && !item.artifacts.is_empty() {
                        item.artifacts.clear();
                        events.push(ItemEvent::ArtifactsChanged {
                            item_id: id.clone(),
                            artifacts: Vec::new(),
                        });
                    }

                    item.status = next;
                    events.push(ItemEvent::StatusChanged {
                        item_id: id.clone(),
                        status: next,
                    });
                    debug!("Item {} {} -> {}", id, from, next);
                }
                Mutation::Artifacts(artifacts) => {
                    if item.status != ItemStatus::Succeeded {
                        return Err(RegistryError::ArtifactsNotAllowed {
                            item_id: id.clone(),
                            status: item.status,
                        });
                    }
                    item.artifacts = artifacts;
                    events.push(ItemEvent::ArtifactsChanged {
                        item_id: id.clone(),
                        artifacts: item.artifacts.clone(),
                    });
                }
                Mutation::Resubmit => match item.status {
                    ItemStatus::Processing => return Err(RegistryError::Busy(id.clone())),
                    ItemStatus::Uploaded => return Ok(item.clone()),
                    ItemStatus::Succeeded | ItemStatus::Failed => {
                        if !item.artifacts.is_empty() {
                            item.artifacts.clear();
                            events.push(ItemEvent::ArtifactsChanged {
                                item_id: id.clone(),
                                artifacts: Vec::new(),
                            });
                        }
                        item.status = ItemStatus::Uploaded;
                        events.push(ItemEvent::StatusChanged {
                            item_id: id.clone(),
                            status: ItemStatus::Uploaded,
                        });
                    }
                },
            }

            item.updated_at = Utc::now();
            item.clone()
        };

        self.publish(events);
        Ok(item)
    }
}

impl ItemRegistry for InMemoryItemRegistry {
    fn register(&self, id: ItemId, display_name: &str) -> Result<Item, RegistryError> {
        let item = {
            let mut state = self.write()?;
            if state.items.contains_key(&id) {
                return Err(RegistryError::AlreadyExists(id));
            }
            let item = Item::new(id.clone(), display_name);
            state.order.push(id.clone());
            state.items.insert(id, item.clone());
            item
        };

        self.publish(vec![ItemEvent::Registered {
            item_id: item.id.clone(),
            display_name: item.display_name.clone(),
        }]);
        Ok(item)
    }

    fn get(&self, id: &ItemId) -> Result<Option<Item>, RegistryError> {
        Ok(self.read()?.items.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Item>, RegistryError> {
        let state = self.read()?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect())
    }

    fn list_pending_ids(&self) -> Result<Vec<ItemId>, RegistryError> {
        let state = self.read()?;
        Ok(state
            .order
            .iter()
            .filter(|id| {
                state
                    .items
                    .get(*id)
                    .is_some_and(|item| item.status == ItemStatus::Uploaded)
            })
            .cloned()
            .collect())
    }

    fn set_status(&self, id: &ItemId, status: ItemStatus) -> Result<Item, RegistryError> {
        self.apply(id, Mutation::Status(status))
    }

    fn set_artifacts(&self, id: &ItemId, artifacts: Vec<Artifact>) -> Result<Item, RegistryError> {
        self.apply(id, Mutation::Artifacts(artifacts))
    }

    fn resubmit(&self, id: &ItemId) -> Result<Item, RegistryError> {
        self.apply(id, Mutation::Resubmit)
    }

    fn remove(&self, id: &ItemId) -> Result<Item, RegistryError> {
        let item = {
            let mut state = self.write()?;
            match state.items.get(id) {
                None => return Err(RegistryError::NotFound(id.clone())),
                Some(item) if item.status == ItemStatus::Processing => {
                    return Err(RegistryError::Busy(id.clone()))
                }
                Some(_) => {}
            }
            state.order.retain(|existing| existing != id);
            state
                .items
                .remove(id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?
        };

        self.publish(vec![ItemEvent::Removed {
            item_id: id.clone(),
        }]);
        Ok(item)
    }

    fn count_by_status(&self) -> Result<HashMap<ItemStatus, usize>, RegistryError> {
        let state = self.read()?;
        let mut counts: HashMap<ItemStatus, usize> =
            ItemStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for item in state.items.values() {
            *counts.entry(item.status).or_default() += 1;
        }
        Ok(counts)
    }

    fn subscribe(&self) -> broadcast::Receiver<ItemEvent> {
        self.events.subscribe()
    }
}
