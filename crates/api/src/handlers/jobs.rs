//! Handlers for the `/jobs` resource.
//!
//! Submission only queues work; callers poll `GET /jobs/{id}` until the
//! snapshot reaches a terminal status.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use wangate_core::job::{JobSnapshot, JobStatus};

use crate::error::{AppError, AppResult};
use crate::query::JobListParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Validate and queue a generation request. Returns 202 with the job id,
/// its `queued` status, and any optional parameters that were replaced by
/// defaults. A body that is not JSON is a 400 in the common error shape.
pub async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let submission = state.pipeline.scheduler().submit(&request)?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submission })))
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// All jobs in submission order. `?status=` restricts the listing.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> AppResult<Json<DataResponse<Vec<JobSnapshot>>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()?;
    let jobs = state.pipeline.query().list_jobs(status);
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let snapshot = state.pipeline.query().get_status(&job_id)?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancels a job that has not started. For any other status the job is
/// left alone and its current snapshot is returned.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let snapshot = state.pipeline.scheduler().cancel(&job_id)?;
    Ok(Json(DataResponse { data: snapshot }))
}
