//! Detect-pool worker loop (SPEC_FULL.md §4.5).

use crate::db::{keywords, tasks};
use crate::detect::{self, DetectCallbacks, DetectOutcome, RETRY_LIMIT};
use crate::media::MediaToolkit;
use crate::models::task::{Stage, TaskStatus};
use crate::notify::{self, Notification};
use crate::queue::{Running, TaskQueue};
use crate::supervisor;
use crate::transcriber::Transcriber;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(
    pool: SqlitePool,
    detect_queue: TaskQueue,
    upload_queue: TaskQueue,
    running: Running,
    toolkit: Arc<dyn MediaToolkit>,
    transcriber: Arc<dyn Transcriber>,
    notify_client: reqwest::Client,
) {
    loop {
        let Some(id) = detect_queue.take().await else {
            return;
        };
        process_one(&pool, &detect_queue, &upload_queue, &running, &toolkit, &transcriber, &notify_client, id).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_one(
    pool: &SqlitePool,
    detect_queue: &TaskQueue,
    upload_queue: &TaskQueue,
    running: &Running,
    toolkit: &Arc<dyn MediaToolkit>,
    transcriber: &Arc<dyn Transcriber>,
    notify_client: &reqwest::Client,
    id: i64,
) {
    let Ok(Some(mut task)) = tasks::load_task(pool, id).await else {
        return;
    };
    if task.status == TaskStatus::Cancelled {
        return;
    }

    let handle = running.register(id).await;
    let cfg = match supervisor::resolve_settings(pool, &task.overrides).await {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(task_id = id, error = %e, "failed to resolve settings, skipping");
            running.deregister(id).await;
            return;
        }
    };
    let keyword_set = keywords::load_enabled(pool).await.unwrap_or_default();

    task.transition_to(TaskStatus::Processing);
    let _ = tasks::save_task(pool, &task).await;

    let callbacks = PersistingCallbacks { pool: pool.clone(), task_id: id };
    let outcome = detect::process(
        toolkit.as_ref(),
        transcriber.as_ref(),
        id,
        Path::new(&task.filepath),
        &cfg,
        &keyword_set,
        &task.overrides.passed(),
        task.retry_count,
        task.overrides.direct_upload(),
        &handle.stop_signal(),
        &callbacks,
    )
    .await;

    // Re-read: on_rename/on_checkpoint callbacks persisted directly, so the
    // in-memory `task` may be stale on filepath/overrides.
    if let Ok(Some(refreshed)) = tasks::load_task(pool, id).await {
        task = refreshed;
    }

    match outcome {
        DetectOutcome::ReadyToUpload(new_path) => {
            task.filepath = new_path.to_string_lossy().into_owned();
            task.filename = new_path.file_name().and_then(|n| n.to_str()).unwrap_or(&task.filename).to_string();
            task.stage = Stage::Upload;
            task.enter_upload_stage();
            task.transition_to(TaskStatus::PendingUpload);
            let _ = tasks::save_task(pool, &task).await;
            upload_queue.enqueue(id);
            info!(task_id = id, "detect complete, queued for upload");
        }
        DetectOutcome::Dirty(reason) => {
            task.append_log(format!("命中关键词: {reason}"));
            task.transition_to(TaskStatus::Dirty);
            let _ = tasks::save_task(pool, &task).await;
            let _ = tokio::fs::remove_file(&task.filepath).await;
            if cfg.notify_errors {
                notify::send(
                    notify_client,
                    &cfg.notify_url,
                    &cfg.notify_token,
                    &Notification { task_id: id, event: "dirty", detail: &reason },
                )
                .await;
            }
            info!(task_id = id, reason = %reason, "task marked dirty");
        }
        DetectOutcome::Retryable(reason) => {
            if task.retry_count < RETRY_LIMIT {
                task.retry_count += 1;
                task.append_log(format!("retry {}/{RETRY_LIMIT}: {reason}", task.retry_count));
                task.transition_to(TaskStatus::Pending);
                let _ = tasks::save_task(pool, &task).await;
                detect_queue.enqueue(id);
                warn!(task_id = id, retry_count = task.retry_count, "detect retry scheduled");
            } else {
                task.append_log(format!("retries exhausted: {reason}"));
                task.transition_to(TaskStatus::Error);
                let _ = tasks::save_task(pool, &task).await;
                if cfg.notify_errors {
                    notify::send(
                        notify_client,
                        &cfg.notify_url,
                        &cfg.notify_token,
                        &Notification { task_id: id, event: "error", detail: &reason },
                    )
                    .await;
                }
                warn!(task_id = id, "detect failed permanently");
            }
        }
        DetectOutcome::Cancelled => {
            task.append_log("cancelled during detection");
            task.transition_to(TaskStatus::Cancelled);
            let _ = tasks::save_task(pool, &task).await;
            info!(task_id = id, "detect cancelled");
        }
    }

    running.deregister(id).await;
}

struct PersistingCallbacks {
    pool: SqlitePool,
    task_id: i64,
}

#[async_trait]
impl DetectCallbacks for PersistingCallbacks {
    async fn on_checkpoint(&self, segment_name: &str) {
        if let Ok(Some(mut task)) = tasks::load_task(&self.pool, self.task_id).await {
            task.overrides.mark_passed(segment_name);
            let _ = tasks::save_task(&self.pool, &task).await;
        }
    }

    async fn on_rename(&self, new_path: &Path) {
        if let Ok(Some(mut task)) = tasks::load_task(&self.pool, self.task_id).await {
            task.filepath = new_path.to_string_lossy().into_owned();
            task.filename = new_path.file_name().and_then(|n| n.to_str()).unwrap_or(&task.filename).to_string();
            task.append_log(format!("renamed to {}", task.filename));
            let _ = tasks::save_task(&self.pool, &task).await;
        }
    }
}
