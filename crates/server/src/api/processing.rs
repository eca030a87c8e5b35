//! Processing run handlers.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use qform_core::{ItemId, ProcessorStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{error_response, processor_error, ApiError};
use crate::state::AppState;

/// Request body for starting a run. Without ids every pending item is
/// processed.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub ids: Option<Vec<ItemId>>,
}

/// Response for an accepted run
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub run_id: u64,
}

/// Queue a processing run and return immediately
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ProcessResponse>), ApiError> {
    let request: ProcessRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
        })?
    };

    let ticket = match request.ids {
        Some(ids) => state.queue().submit(ids).await,
        None => state.queue().process_pending().await,
    }
    .map_err(processor_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            run_id: ticket.run_id,
        }),
    ))
}

/// Current run queue status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ProcessorStatus> {
    Json(state.queue().status().await)
}
