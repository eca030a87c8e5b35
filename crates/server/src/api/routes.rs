use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{artifacts, handlers, items, processing, ws};
use crate::state::AppState;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Generated artifacts and other static files (configurable via env)
    let static_dir = std::env::var("QFORM_STATIC_DIR").unwrap_or_else(|_| "static".to_string());

    let upload_limit = usize::try_from(state.config().uploads.max_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Authenticated API routes
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        // Items
        .route("/items", get(items::list_items))
        .route(
            "/items",
            post(items::upload_item).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/items/{id}",
            get(items::get_item).delete(items::delete_item),
        )
        .route("/items/{id}/resubmit", post(items::resubmit_item))
        // Processing
        .route("/process", post(processing::start_run))
        .route("/process/status", get(processing::get_status))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    // Artifact links resolve relative to the UI root
    let artifact_path = format!("/{}/{{key}}", state.artifacts().route());
    let views = Router::new()
        .route(&artifact_path, get(artifacts::get_artifact))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(views)
        .route("/metrics", get(handlers::metrics))
        .fallback_service(ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
