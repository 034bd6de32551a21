//! POST /batch (SPEC_FULL.md §4.7): apply `retry` or `stop` to every task
//! currently in the given stage.

use crate::db::tasks;
use crate::models::task::{Stage, TaskStatus};
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Retry,
    Stop,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchTarget {
    Detect,
    Upload,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub action: BatchAction,
    pub target: BatchTarget,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub affected: usize,
}

pub async fn batch(State(state): State<AppState>, Json(req): Json<BatchRequest>) -> ApiResult<Json<BatchResponse>> {
    let stage = match req.target {
        BatchTarget::Detect => Stage::Detect,
        BatchTarget::Upload => Stage::Upload,
    };

    let all = tasks::list_tasks(&state.db).await?;
    let matching: Vec<_> = all.into_iter().filter(|t| t.stage == stage).collect();

    let mut affected = 0;
    for mut task in matching {
        state.running.cancel(task.id).await;

        match req.action {
            BatchAction::Stop => {
                if !task.status.is_terminal() {
                    task.append_log("stopped by batch operation");
                    task.transition_to(TaskStatus::Cancelled);
                    tasks::save_task(&state.db, &task).await?;
                }
            }
            BatchAction::Retry => {
                task.retry_count = 0;
                task.finished_at = None;
                task.overrides.clear_passed();
                task.append_log("retry requested via batch operation");
                task.status = match stage {
                    Stage::Detect => TaskStatus::Pending,
                    Stage::Upload => TaskStatus::PendingUpload,
                };
                tasks::save_task(&state.db, &task).await?;
                match stage {
                    Stage::Detect => state.detect_queue.enqueue(task.id),
                    Stage::Upload => state.upload_queue.enqueue(task.id),
                }
            }
        }
        affected += 1;
    }

    Ok(Json(BatchResponse { affected }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/batch", post(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use crate::models::task::Task;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn seed(state: &AppState, id: i64, stage: Stage, status: TaskStatus) {
        let mut task = Task::new(id, "a.mp4".into(), "/scan/a.mp4".into());
        task.stage = stage;
        task.status = status;
        tasks::insert_task(&state.db, &task).await.unwrap();
    }

    #[tokio::test]
    async fn stop_only_affects_matching_stage() {
        let state = test_state("tok").await;
        seed(&state, 1, Stage::Detect, TaskStatus::Processing).await;
        seed(&state, 2, Stage::Upload, TaskStatus::Uploading).await;
        let app = routes().with_state(state.clone());

        let body = serde_json::json!({ "action": "stop", "target": "detect" });
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/batch")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let parsed: BatchResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.affected, 1);

        assert_eq!(tasks::load_task(&state.db, 1).await.unwrap().unwrap().status, TaskStatus::Cancelled);
        assert_eq!(tasks::load_task(&state.db, 2).await.unwrap().unwrap().status, TaskStatus::Uploading);
    }

    #[tokio::test]
    async fn retry_requeues_every_matching_row() {
        let state = test_state("tok").await;
        seed(&state, 1, Stage::Upload, TaskStatus::Error).await;
        seed(&state, 2, Stage::Upload, TaskStatus::Error).await;
        let app = routes().with_state(state.clone());

        let body = serde_json::json!({ "action": "retry", "target": "upload" });
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/batch")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(state.upload_queue.take().await, Some(1));
        assert_eq!(state.upload_queue.take().await, Some(2));
    }

    #[tokio::test]
    async fn retry_clears_passed_checkpoint_on_every_matching_row() {
        let state = test_state("tok").await;
        seed(&state, 1, Stage::Upload, TaskStatus::Error).await;
        {
            let mut task = tasks::load_task(&state.db, 1).await.unwrap().unwrap();
            task.overrides.mark_passed("片尾");
            tasks::save_task(&state.db, &task).await.unwrap();
        }
        let app = routes().with_state(state.clone());

        let body = serde_json::json!({ "action": "retry", "target": "upload" });
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/batch")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

        let loaded = tasks::load_task(&state.db, 1).await.unwrap().unwrap();
        assert!(loaded.overrides.passed().is_empty());
    }
}
