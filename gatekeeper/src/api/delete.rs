//! DELETE /task/:id (SPEC_FULL.md §4.7): cancel if running, remove the
//! on-disk file and its known `_clean`/`_clean_meta` siblings, then delete
//! the row.

use crate::db::tasks;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path as AxumPath, State},
    routing::delete as delete_method,
    Json, Router,
};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub task_id: i64,
    pub deleted: bool,
}

pub async fn delete_task(State(state): State<AppState>, AxumPath(id): AxumPath<i64>) -> ApiResult<Json<DeleteResponse>> {
    let Some(task) = tasks::load_task(&state.db, id).await? else {
        return Err(ApiError::NotFound(format!("task {id}")));
    };

    state.running.cancel(id).await;

    let current = Path::new(&task.filepath);
    let _ = tokio::fs::remove_file(current).await;
    for sibling in clean_siblings(current) {
        let _ = tokio::fs::remove_file(sibling).await;
    }

    tasks::delete_task(&state.db, id).await?;

    Ok(Json(DeleteResponse { task_id: id, deleted: true }))
}

/// The `_clean` rewrite sibling (subtitle scrub) and the legacy
/// `_clean_meta` name kept for operators upgrading from the source
/// implementation's on-disk convention.
fn clean_siblings(path: &Path) -> Vec<std::path::PathBuf> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return vec![];
    };
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    ["_clean", "_clean_meta"]
        .iter()
        .map(|suffix| path.with_file_name(format!("{stem}{suffix}.{ext}")))
        .collect()
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/task/:id", delete_method(delete_task))
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
    async fn delete_removes_file_and_row() {
        let state = test_state("tok").await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("movie.mp4");
        std::fs::write(&file, b"x").unwrap();

        let task = Task::new(1, "movie.mp4".into(), file.to_string_lossy().into_owned());
        tasks::insert_task(&state.db, &task).await.unwrap();
        let app = routes().with_state(state.clone());

        let res = app
            .oneshot(
                Request::builder().method("DELETE").uri("/task/1").body(Body::empty()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        assert!(!file.exists());
        assert!(tasks::load_task(&state.db, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_task_is_not_found() {
        let state = test_state("tok").await;
        let app = routes().with_state(state);

        let res = app
            .oneshot(Request::builder().method("DELETE").uri("/task/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
