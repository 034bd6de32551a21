//! Task persistence.

use crate::models::overrides::Overrides;
use crate::models::task::{Stage, Task, TaskStatus};
use crate::utils::db_retry::retry_on_lock;
use chrono::{DateTime, Utc};
use gatekeeper_common::{Error, Result};
use sqlx::{Row, SqlitePool};

const RING_SIZE: i64 = 10000;

pub async fn insert_task(pool: &SqlitePool, task: &Task) -> Result<()> {
    retry_on_lock("insert_task", 5000, || async { insert_task_once(pool, task).await }).await
}

async fn insert_task_once(pool: &SqlitePool, task: &Task) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tasks (
            id, filename, filepath, status, stage, progress, log,
            created_at, finished_at, retry_count, overrides, upload_speed, upload_eta
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.id)
    .bind(&task.filename)
    .bind(&task.filepath)
    .bind(task.status.as_db_str())
    .bind(task.stage.as_db_str())
    .bind(task.progress as i64)
    .bind(&task.log)
    .bind(task.created_at.to_rfc3339())
    .bind(task.finished_at.map(|dt| dt.to_rfc3339()))
    .bind(task.retry_count)
    .bind(task.overrides.to_json_string())
    .bind(&task.upload_speed)
    .bind(&task.upload_eta)
    .execute(pool)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

/// Persist every mutable field of an existing task row.
pub async fn save_task(pool: &SqlitePool, task: &Task) -> Result<()> {
    retry_on_lock("save_task", 5000, || async { save_task_once(pool, task).await }).await
}

async fn save_task_once(pool: &SqlitePool, task: &Task) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tasks SET
            filename = ?, filepath = ?, status = ?, stage = ?, progress = ?,
            log = ?, finished_at = ?, retry_count = ?, overrides = ?,
            upload_speed = ?, upload_eta = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.filename)
    .bind(&task.filepath)
    .bind(task.status.as_db_str())
    .bind(task.stage.as_db_str())
    .bind(task.progress as i64)
    .bind(&task.log)
    .bind(task.finished_at.map(|dt| dt.to_rfc3339()))
    .bind(task.retry_count)
    .bind(task.overrides.to_json_string())
    .bind(&task.upload_speed)
    .bind(&task.upload_eta)
    .bind(task.id)
    .execute(pool)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

pub async fn load_task(pool: &SqlitePool, id: i64) -> Result<Option<Task>> {
    let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)?;

    row.map(row_to_task).transpose()
}

pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<Task>> {
    let rows = sqlx::query("SELECT * FROM tasks ORDER BY id").fetch_all(pool).await.map_err(Error::Database)?;
    rows.into_iter().map(row_to_task).collect()
}

pub async fn list_by_status(pool: &SqlitePool, statuses: &[TaskStatus]) -> Result<Vec<Task>> {
    let all = list_tasks(pool).await?;
    Ok(all.into_iter().filter(|t| statuses.contains(&t.status)).collect())
}

pub async fn delete_task(pool: &SqlitePool, id: i64) -> Result<()> {
    retry_on_lock("delete_task", 5000, || async {
        sqlx::query("DELETE FROM tasks WHERE id = ?").bind(id).execute(pool).await.map_err(Error::Database)?;
        Ok(())
    })
    .await
}

pub async fn delete_terminal(pool: &SqlitePool) -> Result<u64> {
    retry_on_lock("delete_terminal", 5000, || async {
        let result = sqlx::query(
            "DELETE FROM tasks WHERE status IN ('uploaded', 'dirty', 'error', 'cancelled')",
        )
        .execute(pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    })
    .await
}

/// **[ID allocator]** read the current `sys_task_counter` and compute the
/// next ring slot, without mutating anything. The caller is expected to
/// cancel any running worker for the returned id (via the in-memory
/// `running` registry) before calling [`finalize_next_id`].
pub async fn peek_next_id(pool: &SqlitePool) -> Result<i64> {
    let counter: String = sqlx::query_scalar("SELECT value FROM config WHERE key = 'sys_task_counter'")
        .fetch_one(pool)
        .await
        .map_err(Error::Database)?;
    let counter: i64 = counter.parse().unwrap_or(0);
    let next = (counter + 1) % RING_SIZE;
    Ok(if next == 0 { 1 } else { next })
}

/// Advance the counter and delete any pre-existing row occupying `id`, in
/// one transaction (SPEC_FULL.md §9: "reusing an id must first delete the
/// prior row ... under a single transaction").
pub async fn finalize_next_id(pool: &SqlitePool, id: i64) -> Result<()> {
    retry_on_lock("finalize_next_id", 5000, || async {
        let mut tx = pool.begin().await.map_err(Error::Database)?;
        sqlx::query("DELETE FROM tasks WHERE id = ?").bind(id).execute(&mut *tx).await.map_err(Error::Database)?;
        sqlx::query("UPDATE config SET value = ? WHERE key = 'sys_task_counter'")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    })
    .await
}

/// **[Startup recovery]** rewrite non-terminal rows left over from a prior
/// process to their restartable equivalents and return the ids to
/// re-enqueue, split by destination pool.
pub async fn rewrite_interrupted_on_startup(pool: &SqlitePool) -> Result<(Vec<i64>, Vec<i64>)> {
    retry_on_lock("rewrite_interrupted_on_startup", 5000, || async {
        let detect_rows: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM tasks WHERE status IN ('processing', 'pending')",
        )
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE tasks SET status = 'pending' WHERE status IN ('processing', 'pending')")
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        let upload_rows: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM tasks WHERE status IN ('uploading', 'pending_upload')",
        )
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE tasks SET status = 'pending_upload' WHERE status IN ('uploading', 'pending_upload')")
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        Ok((detect_rows, upload_rows))
    })
    .await
}

fn row_to_task(row: sqlx::sqlite::SqliteRow) -> Result<Task> {
    let status: String = row.get("status");
    let status = TaskStatus::from_db_str(&status)
        .ok_or_else(|| Error::Internal(format!("unknown task status {status}")))?;

    let stage: String = row.get("stage");
    let overrides_json: String = row.get("overrides");
    let overrides = Overrides::from_json_str(&overrides_json)
        .map_err(|e| Error::Internal(format!("corrupt overrides json: {e}")))?;

    let created_at: String = row.get("created_at");
    let created_at: DateTime<Utc> =
        DateTime::parse_from_rfc3339(&created_at).map_err(|e| Error::Internal(e.to_string()))?.with_timezone(&Utc);

    let finished_at: Option<String> = row.get("finished_at");
    let finished_at = finished_at
        .map(|s| DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(e.to_string()))?
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Task {
        id: row.get("id"),
        filename: row.get("filename"),
        filepath: row.get("filepath"),
        status,
        stage: Stage::from_db_str(&stage),
        progress: row.get::<i64, _>("progress") as u8,
        log: row.get("log"),
        created_at,
        finished_at,
        retry_count: row.get("retry_count"),
        overrides,
        upload_speed: row.get("upload_speed"),
        upload_eta: row.get("upload_eta"),
    })
}
