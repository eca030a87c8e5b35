//! Item data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of an uploaded item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Processing status of an item.
///
/// ```text
/// Uploaded -> Processing -> Succeeded
///                        -> Failed
/// ```
///
/// A terminal item re-enters `Processing` only when it is submitted into a
/// new run, and goes back to `Uploaded` only through an explicit resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Uploaded,
    Processing,
    Succeeded,
    Failed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Uploaded,
        ItemStatus::Processing,
        ItemStatus::Succeeded,
        ItemStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Uploaded => "uploaded",
            ItemStatus::Processing => "processing",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }

    /// Whether a status update from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (*self, next),
            (Uploaded | Succeeded | Failed, Processing) | (Processing, Succeeded | Failed)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a derived artifact (a generated flowchart view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Position in `0..k`.
    pub ordinal: usize,
    /// Relative link, `<route>/<item id>_<ordinal>`.
    pub href: String,
    /// Where the view itself is fetched from; `href` redirects here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One uploaded unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub display_name: String,
    pub status: ItemStatus,
    /// Empty unless `status == Succeeded`.
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// A freshly uploaded item.
    pub fn new(id: ItemId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            status: ItemStatus::Uploaded,
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Change notification published by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEvent {
    Registered {
        item_id: ItemId,
        display_name: String,
    },
    StatusChanged {
        item_id: ItemId,
        status: ItemStatus,
    },
    ArtifactsChanged {
        item_id: ItemId,
        artifacts: Vec<Artifact>,
    },
    Removed {
        item_id: ItemId,
    },
}

impl ItemEvent {
    pub fn item_id(&self) -> &ItemId {
        match self {
            ItemEvent::Registered { item_id, .. }
            | ItemEvent::StatusChanged { item_id, .. }
            | ItemEvent::ArtifactsChanged { item_id, .. }
            | ItemEvent::Removed { item_id } => item_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_starts_uploaded() {
        let item = Item::new(ItemId::from("f1"), "survey.xml");
        assert_eq!(item.status, ItemStatus::Uploaded);
        assert!(item.artifacts.is_empty());
        assert_eq!(item.display_name, "survey.xml");
    }

    #[test]
    fn test_transitions() {
        use ItemStatus::*;
        assert!(Uploaded.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Succeeded));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));
        assert!(Succeeded.can_transition_to(Processing));

        assert!(!Uploaded.can_transition_to(Succeeded));
        assert!(!Uploaded.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Uploaded));
        assert!(!Succeeded.can_transition_to(Failed));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ItemStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
        assert_eq!(ItemStatus::Processing.to_string(), "processing");
    }

    #[test]
    fn test_item_id_is_transparent() {
        let json = serde_json::to_string(&ItemId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ItemEvent::StatusChanged {
            item_id: ItemId::from("f1"),
            status: ItemStatus::Failed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["item_id"], "f1");
        assert_eq!(json["status"], "failed");
        assert_eq!(event.item_id().as_str(), "f1");
    }
}
