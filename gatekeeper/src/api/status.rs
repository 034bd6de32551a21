//! GET /status/:id, GET /list (SPEC_FULL.md §4.7): read-only task
//! inspection backing every mutating operation above.

use crate::db::tasks;
use crate::models::task::{Stage, Task, TaskStatus};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub status: TaskStatus,
    pub stage: Stage,
    pub progress: u8,
    pub log: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub upload_speed: Option<String>,
    pub upload_eta: Option<String>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        TaskResponse {
            id: task.id,
            filename: task.filename,
            filepath: task.filepath,
            status: task.status,
            stage: task.stage,
            progress: task.progress,
            log: task.log,
            created_at: task.created_at,
            finished_at: task.finished_at,
            retry_count: task.retry_count,
            upload_speed: task.upload_speed,
            upload_eta: task.upload_eta,
        }
    }
}

pub async fn status(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<TaskResponse>> {
    let task = tasks::load_task(&state.db, id).await?.ok_or_else(|| ApiError::NotFound(format!("task {id}")))?;
    Ok(Json(task.into()))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<TaskResponse>>> {
    let tasks = tasks::list_tasks(&state.db).await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/status/:id", get(status)).route("/list", get(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn status_returns_the_task() {
        let state = test_state("tok").await;
        let task = Task::new(1, "a.mp4".into(), "/scan/a.mp4".into());
        tasks::insert_task(&state.db, &task).await.unwrap();
        let app = routes().with_state(state.clone());

        let res = app
            .oneshot(Request::builder().uri("/status/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let parsed: TaskResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.filename, "a.mp4");
    }

    #[tokio::test]
    async fn status_missing_task_is_not_found() {
        let state = test_state("tok").await;
        let app = routes().with_state(state);

        let res = app.oneshot(Request::builder().uri("/status/404").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_every_task() {
        let state = test_state("tok").await;
        tasks::insert_task(&state.db, &Task::new(1, "a.mp4".into(), "/scan/a.mp4".into())).await.unwrap();
        tasks::insert_task(&state.db, &Task::new(2, "b.mp4".into(), "/scan/b.mp4".into())).await.unwrap();
        let app = routes().with_state(state.clone());

        let res = app.oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap()).await.unwrap();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let parsed: Vec<TaskResponse> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
