//! Upload-pool worker loop (SPEC_FULL.md §4.5). No internal retry: a single
//! failure moves the task straight to `error`.

use crate::db::tasks;
use crate::media::MediaToolkit;
use crate::models::task::TaskStatus;
use crate::notify::{self, Notification};
use crate::queue::{Running, TaskQueue};
use crate::supervisor;
use crate::utils::fs_cleanup::remove_empty_ancestors;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(
    pool: SqlitePool,
    upload_queue: TaskQueue,
    running: Running,
    toolkit: Arc<dyn MediaToolkit>,
    notify_client: reqwest::Client,
    scan_root: PathBuf,
) {
    loop {
        let Some(id) = upload_queue.take().await else {
            return;
        };
        process_one(&pool, &running, &toolkit, &notify_client, &scan_root, id).await;
    }
}

async fn process_one(
    pool: &SqlitePool,
    running: &Running,
    toolkit: &Arc<dyn MediaToolkit>,
    notify_client: &reqwest::Client,
    scan_root: &Path,
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
            warn!(task_id = id, error = %e, "failed to resolve settings, skipping upload");
            running.deregister(id).await;
            return;
        }
    };

    task.transition_to(TaskStatus::Uploading);
    let _ = tasks::save_task(pool, &task).await;

    let file_path = PathBuf::from(&task.filepath);
    let remote = supervisor::remote_target(scan_root, &file_path, &cfg.rclone_remote);

    let upload_result = toolkit.upload(&file_path, &remote).await;
    let (pgid, mut events) = match upload_result {
        Ok(pair) => pair,
        Err(e) => {
            fail_upload(pool, notify_client, &cfg, &mut task, &e.to_string()).await;
            running.deregister(id).await;
            return;
        }
    };
    handle.set_active_pgid(Some(pgid)).await;

    let mut failed_reason: Option<String> = None;
    while let Some(event) = events.recv().await {
        if event.percent == crate::media::upload::UPLOAD_FAILURE_SENTINEL {
            failed_reason = Some("upload tool reported failure".to_string());
            break;
        }
        task.progress = event.percent.clamp(0.0, 100.0) as u8;
        task.upload_speed = event.speed.clone();
        task.upload_eta = event.eta.clone();
        let _ = tasks::save_task(pool, &task).await;
    }
    handle.set_active_pgid(None).await;

    if handle.is_cancelled() {
        task.append_log("cancelled during upload");
        task.transition_to(TaskStatus::Cancelled);
        let _ = tasks::save_task(pool, &task).await;
        info!(task_id = id, "upload cancelled");
        running.deregister(id).await;
        return;
    }

    match failed_reason {
        Some(reason) => fail_upload(pool, notify_client, &cfg, &mut task, &reason).await,
        None => {
            task.append_log("upload complete");
            task.transition_to(TaskStatus::Uploaded);
            let _ = tasks::save_task(pool, &task).await;
            if let Some(parent) = file_path.parent() {
                remove_empty_ancestors(parent, scan_root);
            }
            if cfg.notify_upload_success {
                notify::send(
                    notify_client,
                    &cfg.notify_url,
                    &cfg.notify_token,
                    &Notification { task_id: id, event: "uploaded", detail: &task.filename },
                )
                .await;
            }
            info!(task_id = id, "upload complete");
        }
    }

    running.deregister(id).await;
}

async fn fail_upload(
    pool: &SqlitePool,
    notify_client: &reqwest::Client,
    cfg: &crate::models::config::RuntimeSettings,
    task: &mut crate::models::task::Task,
    reason: &str,
) {
    task.append_log(format!("upload failed: {reason}"));
    task.transition_to(TaskStatus::Error);
    let _ = tasks::save_task(pool, task).await;
    if cfg.notify_errors {
        notify::send(
            notify_client,
            &cfg.notify_url,
            &cfg.notify_token,
            &Notification { task_id: task.id, event: "error", detail: reason },
        )
        .await;
    }
    warn!(task_id = task.id, reason, "upload failed");
}

