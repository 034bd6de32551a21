//! POST /cancel/:id (SPEC_FULL.md §4.7): stop a running worker cooperatively
//! and preemptively, and mark the row cancelled even if no worker currently
//! holds it (e.g. still sitting in a queue).

use crate::db::tasks;
use crate::models::task::TaskStatus;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub task_id: i64,
    pub status: &'static str,
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<CancelResponse>> {
    let Some(mut task) = tasks::load_task(&state.db, id).await? else {
        return Err(ApiError::NotFound(format!("task {id}")));
    };

    state.running.cancel(id).await;

    if !task.status.is_terminal() {
        task.append_log("cancelled by operator");
        task.transition_to(TaskStatus::Cancelled);
        tasks::save_task(&state.db, &task).await?;
    }

    Ok(Json(CancelResponse { task_id: id, status: "cancelled" }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/cancel/:id", post(cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use crate::models::task::Task;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn cancel_marks_pending_task_cancelled() {
        let state = test_state("tok").await;
        let task = Task::new(1, "a.mp4".into(), "/scan/a.mp4".into());
        tasks::insert_task(&state.db, &task).await.unwrap();
        let app = routes().with_state(state.clone());

        let res = app
            .oneshot(Request::builder().method("POST").uri("/cancel/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let loaded = tasks::load_task(&state.db, 1).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_on_terminal_task_is_a_no_op_status_change() {
        let state = test_state("tok").await;
        let mut task = Task::new(2, "a.mp4".into(), "/scan/a.mp4".into());
        task.status = TaskStatus::Uploaded;
        tasks::insert_task(&state.db, &task).await.unwrap();
        let app = routes().with_state(state.clone());

        app.oneshot(Request::builder().method("POST").uri("/cancel/2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let loaded = tasks::load_task(&state.db, 2).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Uploaded);
    }

    #[tokio::test]
    async fn cancel_missing_task_is_not_found() {
        let state = test_state("tok").await;
        let app = routes().with_state(state);

        let res = app
            .oneshot(Request::builder().method("POST").uri("/cancel/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
