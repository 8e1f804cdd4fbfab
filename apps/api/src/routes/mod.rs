pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/v1/analysis/upload", post(handlers::handle_upload))
        .route("/v1/analysis/start", post(handlers::handle_start))
        .route("/v1/analysis/job-finder", post(handlers::handle_job_finder))
        .route("/v1/analysis/:id", get(handlers::handle_get_status))
        .with_state(state)
}
