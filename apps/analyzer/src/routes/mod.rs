pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route("/api/v1/analyze/batch", post(handlers::handle_analyze_batch))
        .route(
            "/api/v1/analyze/folder",
            post(handlers::handle_analyze_folder),
        )
        // Background jobs
        .route("/api/v1/jobs", post(handlers::handle_start_job))
        .route(
            "/api/v1/jobs/:id",
            get(handlers::handle_get_job).delete(handlers::handle_cancel_job),
        )
        .route("/api/v1/jobs/:id/export", get(handlers::handle_export_job))
        // Export
        .route("/api/v1/export", post(handlers::handle_export))
        .layer(body_limit)
        .with_state(state)
}
