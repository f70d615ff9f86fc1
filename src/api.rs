pub(crate) mod episodes;
pub(crate) mod health;
pub(crate) mod jobs;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};

use crate::app::AppState;

/// The HTTP surface for job control and episode delivery. Profile CRUD is
/// out of scope: profiles are a managed configuration input.
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/jobs", post(jobs::create))
        .route("/jobs/{job_id}", get(jobs::get))
        .route("/jobs/{job_id}/cancel", post(jobs::cancel))
        .route("/jobs/{job_id}/approve", post(jobs::approve))
        .route("/profiles/{id}/episodes", get(episodes::list_for_profile))
        .route("/episodes/{id}/feed.xml", get(episodes::feed))
        .route("/episodes/{id}/audio", get(episodes::audio))
        .with_state(state)
}
