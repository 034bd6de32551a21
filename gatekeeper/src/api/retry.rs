//! POST /retry/:id, /adjust_and_retry/:id, /direct_upload/:id — reset a task
//! and re-enqueue it on whichever queue matches its current stage
//! (SPEC_FULL.md §4.7).

use crate::db::tasks;
use crate::models::task::{Stage, TaskStatus};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Map;

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub task_id: i64,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AdjustAndRetryRequest {
    #[serde(default)]
    pub overrides: Map<String, serde_json::Value>,
}

/// Shared reset: stop any in-flight worker, clear its terminal timestamp,
/// reset the retry budget, and requeue on the queue matching its stage.
async fn reset_and_enqueue(state: &AppState, id: i64) -> ApiResult<()> {
    state.running.cancel(id).await;

    let Some(mut task) = tasks::load_task(&state.db, id).await? else {
        return Err(ApiError::NotFound(format!("task {id}")));
    };

    task.retry_count = 0;
    task.finished_at = None;
    task.overrides.clear_passed();
    task.append_log("retry requested");

    match task.stage {
        Stage::Detect => {
            task.status = TaskStatus::Pending;
            tasks::save_task(&state.db, &task).await?;
            state.detect_queue.enqueue(id);
        }
        Stage::Upload => {
            task.status = TaskStatus::PendingUpload;
            tasks::save_task(&state.db, &task).await?;
            state.upload_queue.enqueue(id);
        }
    }

    Ok(())
}

pub async fn retry(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<RetryResponse>> {
    reset_and_enqueue(&state, id).await?;
    Ok(Json(RetryResponse { task_id: id, status: "requeued" }))
}

pub async fn adjust_and_retry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AdjustAndRetryRequest>,
) -> ApiResult<Json<RetryResponse>> {
    let Some(mut task) = tasks::load_task(&state.db, id).await? else {
        return Err(ApiError::NotFound(format!("task {id}")));
    };
    task.overrides.merge(req.overrides);
    tasks::save_task(&state.db, &task).await?;

    reset_and_enqueue(&state, id).await?;
    Ok(Json(RetryResponse { task_id: id, status: "requeued" }))
}

pub async fn direct_upload(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<RetryResponse>> {
    let Some(mut task) = tasks::load_task(&state.db, id).await? else {
        return Err(ApiError::NotFound(format!("task {id}")));
    };
    task.overrides.set_direct_upload(true);
    task.stage = Stage::Detect;
    tasks::save_task(&state.db, &task).await?;

    reset_and_enqueue(&state, id).await?;
    Ok(Json(RetryResponse { task_id: id, status: "requeued" }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/retry/:id", post(retry))
        .route("/adjust_and_retry/:id", post(adjust_and_retry))
        .route("/direct_upload/:id", post(direct_upload))
}
