//! Artifact view links.
//!
//! Item responses carry hrefs of the form `<route>/<id>_<ordinal>`. This
//! handler resolves them to the view the processing service produced.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
};
use qform_core::{ArtifactPolicy, ItemStatus};
use std::sync::Arc;
use tracing::debug;

use super::handlers::{error_response, registry_error, ApiError};
use crate::state::AppState;

/// Redirect an artifact link to its view.
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Redirect, ApiError> {
    let (id, ordinal) = ArtifactPolicy::parse_key(&key).ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("malformed artifact key: {}", key),
        )
    })?;

    let item = state
        .registry()
        .get(&id)
        .map_err(registry_error)?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("item not registered: {}", id))
        })?;

    if item.status != ItemStatus::Succeeded {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("item {} has not been processed", id),
        ));
    }

    let source = item
        .artifacts
        .into_iter()
        .find(|a| a.ordinal == ordinal)
        .ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                format!("item {} has no artifact {}", id, ordinal),
            )
        })?
        .source
        .ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                format!("artifact {} of item {} has no view", ordinal, id),
            )
        })?;

    debug!("Artifact {} -> {}", key, source);
    Ok(Redirect::temporary(&source))
}
