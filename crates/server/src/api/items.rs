//! Item API handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use qform_core::{Artifact, Item, ItemId, ItemStatus};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::handlers::{error_response, registry_error, upload_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Response for item operations
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: ItemId,
    pub display_name: String,
    pub status: ItemStatus,
    pub artifacts: Vec<Artifact>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            display_name: item.display_name,
            status: item.status,
            artifacts: item.artifacts,
            created_at: item.created_at.to_rfc3339(),
            updated_at: item.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing items
#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<ItemResponse>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all items in upload order
pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListItemsResponse>, ApiError> {
    let items = state.registry().list().map_err(registry_error)?;
    let total = items.len();
    Ok(Json(ListItemsResponse {
        items: items.into_iter().map(ItemResponse::from).collect(),
        total,
    }))
}

/// Upload a file (multipart field `file`) and register it as a pending item
pub async fn upload_item(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart body: {}", e),
                ))
            }
        };

        if field.name() != Some("file") {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Failed to read file: {}", e),
            )
        })?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) = upload
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "No file part"))?;

    let item = state
        .uploads()
        .accept(&file_name, &bytes)
        .await
        .map_err(upload_error)?;

    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// Get a single item
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let id = ItemId::from(id);
    match state.registry().get(&id).map_err(registry_error)? {
        Some(item) => Ok(Json(ItemResponse::from(item))),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Item not found: {}", id),
        )),
    }
}

/// Remove an item and its stored file
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state
        .uploads()
        .remove(&ItemId::from(id))
        .await
        .map_err(upload_error)?;
    Ok(Json(ItemResponse::from(item)))
}

/// Put a finished item back into the pending set
pub async fn resubmit_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state
        .registry()
        .resubmit(&ItemId::from(id))
        .map_err(registry_error)?;
    Ok(Json(ItemResponse::from(item)))
}
