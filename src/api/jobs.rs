use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::app::AppState;
use crate::model::{GenerationJob, JobOptions, PodcastScript, Stage};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateJobRequest {
    profile_id: Uuid,
    #[serde(default)]
    options: JobOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateJobResponse {
    job_id: Uuid,
}

/// Starts a new generation job for a profile.
pub(crate) async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> impl IntoResponse {
    state.telemetry().record_manual_generate_invocation(request.profile_id);
    match state.orchestrator().start(request.profile_id, request.options).await {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(CreateJobResponse { job_id })).into_response(),
        Err(error) => {
            error!(%error, profile_id = %request.profile_id, "failed to start job");
            (StatusCode::CONFLICT, Json(ErrorBody { error: error.to_string() })).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatusSnapshot {
    job_id: Uuid,
    status: &'static str,
    current_stage: Option<&'static str>,
    progress_percent: u8,
    stages_completed: Vec<&'static str>,
    stages_pending: Vec<&'static str>,
    activity_log: Vec<String>,
    current_activity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episode_id: Option<String>,
}

impl From<GenerationJob> for JobStatusSnapshot {
    fn from(job: GenerationJob) -> Self {
        Self {
            job_id: job.id,
            status: status_str(job.status),
            current_stage: job.current_stage.map(Stage::as_str),
            progress_percent: job.progress_percent,
            stages_completed: job.stages_completed.iter().copied().map(Stage::as_str).collect(),
            stages_pending: job.stages_pending.iter().copied().map(Stage::as_str).collect(),
            activity_log: job.activity_log.iter().map(|entry| entry.message.clone()).collect(),
            current_activity: job.current_activity,
            error_message: job.error_message,
            episode_id: job.episode_id,
        }
    }
}

fn status_str(status: crate::model::JobStatus) -> &'static str {
    use crate::model::JobStatus;
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::WaitingForReview => "waiting_for_review",
        JobStatus::Resumed => "resumed",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

/// Returns the current status snapshot for a job.
pub(crate) async fn get(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    match state.orchestrator().get_status(job_id).await {
        Ok(Some(job)) => Json(JobStatusSnapshot::from(job)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            error!(%error, %job_id, "failed to load job status");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct OkBody {
    ok: bool,
}

/// Cancels a non-terminal job.
pub(crate) async fn cancel(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    state.telemetry().record_admin_cancel_invocation(job_id);
    match state.orchestrator().cancel(job_id).await {
        Ok(true) => (StatusCode::OK, Json(OkBody { ok: true })).into_response(),
        Ok(false) => StatusCode::CONFLICT.into_response(),
        Err(error) => {
            error!(%error, %job_id, "failed to cancel job");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Resumes a job paused for editorial review. An empty body approves the
/// script as generated; a non-empty body is the editorial rewrite.
pub(crate) async fn approve(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let edited_script: Option<PodcastScript> = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(script) => Some(script),
            Err(error) => {
                return (StatusCode::BAD_REQUEST, Json(ErrorBody { error: error.to_string() })).into_response();
            }
        }
    };

    match state.orchestrator().approve(job_id, edited_script).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => {
            error!(%error, %job_id, "failed to approve job");
            (StatusCode::CONFLICT, Json(ErrorBody { error: error.to_string() })).into_response()
        }
    }
}
