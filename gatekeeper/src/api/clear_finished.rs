//! POST /clear_finished (SPEC_FULL.md §4.7): drop every row in a terminal
//! status.

use crate::db::tasks;
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearFinishedResponse {
    pub removed: u64,
}

pub async fn clear_finished(State(state): State<AppState>) -> ApiResult<Json<ClearFinishedResponse>> {
    let removed = tasks::delete_terminal(&state.db).await?;
    Ok(Json(ClearFinishedResponse { removed }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/clear_finished", post(clear_finished))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use crate::models::task::{Task, TaskStatus};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn clears_only_terminal_rows() {
        let state = test_state("tok").await;
        let mut done = Task::new(1, "a.mp4".into(), "/scan/a.mp4".into());
        done.status = TaskStatus::Uploaded;
        tasks::insert_task(&state.db, &done).await.unwrap();
        let pending = Task::new(2, "b.mp4".into(), "/scan/b.mp4".into());
        tasks::insert_task(&state.db, &pending).await.unwrap();

        let app = routes().with_state(state.clone());
        let res = app
            .oneshot(Request::builder().method("POST").uri("/clear_finished").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let parsed: ClearFinishedResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.removed, 1);

        assert!(tasks::load_task(&state.db, 1).await.unwrap().is_none());
        assert!(tasks::load_task(&state.db, 2).await.unwrap().is_some());
    }
}
