use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use qform_core::{ProcessorError, RegistryError, SanitizedConfig, UploadError};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn registry_error(e: RegistryError) -> ApiError {
    let status = match e {
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::LockPoisoned => {
            error!("Item registry unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::CONFLICT,
    };
    error_response(status, e.to_string())
}

pub fn upload_error(e: UploadError) -> ApiError {
    match e {
        UploadError::Registry(e) => registry_error(e),
        UploadError::Storage { .. } => {
            error!("Upload storage failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        _ => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

pub fn processor_error(e: ProcessorError) -> ApiError {
    match e {
        ProcessorError::Registry(e) => registry_error(e),
        ProcessorError::NotRunning | ProcessorError::QueueFull(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
