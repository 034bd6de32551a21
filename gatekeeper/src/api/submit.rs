//! POST /submit — the trigger protocol's only write path that creates a
//! task from scratch (SPEC_FULL.md §6).

use crate::db::tasks;
use crate::models::task::Task;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub code: u16,
    pub task_id: i64,
}

pub async fn submit(State(state): State<AppState>, Json(req): Json<SubmitRequest>) -> ApiResult<Json<SubmitResponse>> {
    if req.path.trim().is_empty() {
        return Err(ApiError::BadRequest("path must not be empty".into()));
    }

    let path = Path::new(&req.path);
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or(&req.path).to_string();

    let id = tasks::peek_next_id(&state.db).await?;
    state.running.cancel(id).await;
    tasks::finalize_next_id(&state.db, id).await?;

    let task = Task::new(id, filename, req.path.clone());
    tasks::insert_task(&state.db, &task).await?;
    state.detect_queue.enqueue(id);

    Ok(Json(SubmitResponse { code: 200, task_id: id }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/submit", post(submit))
}
