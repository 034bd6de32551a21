//! Schema creation and versioned migrations.
//!
//! Three tables (`tasks`, `config`, `keywords`) plus a `schema_version`
//! tracking table. New tables are created with `CREATE TABLE IF NOT EXISTS`;
//! subsequent changes go through a numbered, idempotent migration function
//! guarded by `pragma_table_info` checks — proportionate to three small
//! tables, versus a generic column-sync abstraction.

use crate::models::keyword::BUILTIN_KEYWORDS;
use crate::models::config::SETTING_DEFS;
use gatekeeper_common::Result;
use sqlx::SqlitePool;
use tracing::info;

const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The schema version this build migrates to, surfaced by the `health`
/// endpoint (SPEC_FULL.md §4.7).
pub fn current_schema_version() -> i32 {
    CURRENT_SCHEMA_VERSION
}

pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout=5000").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_tasks_table(pool).await?;
    create_config_table(pool).await?;
    create_keywords_table(pool).await?;

    seed_defaults(pool).await?;
    run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            filepath TEXT NOT NULL,
            status TEXT NOT NULL,
            stage TEXT NOT NULL DEFAULT 'detect',
            progress INTEGER NOT NULL DEFAULT 0,
            log TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            finished_at TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            overrides TEXT NOT NULL DEFAULT '{}',
            upload_speed TEXT,
            upload_eta TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_config_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_keywords_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed the built-in keyword list, the default Config rows (from
/// [`SETTING_DEFS`]), and the `sys_task_counter` row backing the id
/// allocator — all with `INSERT OR IGNORE` so reseeding on every startup is
/// a no-op once an operator has edited the stored values.
async fn seed_defaults(pool: &SqlitePool) -> Result<()> {
    for (kind, content) in BUILTIN_KEYWORDS {
        sqlx::query("INSERT OR IGNORE INTO keywords (kind, content, enabled) VALUES (?, ?, 1)")
            .bind(kind.as_db_str())
            .bind(*content)
            .execute(pool)
            .await?;
    }

    for (key, _ty, default_text) in SETTING_DEFS {
        sqlx::query("INSERT OR IGNORE INTO config (key, value) VALUES (?, ?)")
            .bind(*key)
            .bind(*default_text)
            .execute(pool)
            .await?;
    }

    sqlx::query("INSERT OR IGNORE INTO config (key, value) VALUES ('sys_task_counter', '0')")
        .execute(pool)
        .await?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> = sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations. There are none yet beyond the baseline
/// `CURRENT_SCHEMA_VERSION = 1` created by [`initialize_schema`] — this is
/// the place future `ALTER TABLE` changes go, following the same
/// `migrate_vN` shape as the baseline's own version bump.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = get_schema_version(pool).await?;

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    info!(from = current, to = CURRENT_SCHEMA_VERSION, "running database migrations");
    set_schema_version(pool, CURRENT_SCHEMA_VERSION).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn initialize_schema_is_idempotent() {
        let pool = memory_pool().await;
        initialize_schema(&pool).await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM keywords").fetch_one(&pool).await.unwrap();
        assert_eq!(count as usize, BUILTIN_KEYWORDS.len());
    }

    #[tokio::test]
    async fn seeds_all_default_config_keys() {
        let pool = memory_pool().await;
        initialize_schema(&pool).await.unwrap();

        for (key, ..) in SETTING_DEFS {
            let value: Option<String> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
                .bind(*key)
                .fetch_optional(&pool)
                .await
                .unwrap();
            assert!(value.is_some(), "missing seeded key {key}");
        }
    }

    #[tokio::test]
    async fn seeding_does_not_clobber_operator_edits() {
        let pool = memory_pool().await;
        initialize_schema(&pool).await.unwrap();

        sqlx::query("UPDATE config SET value = '9999' WHERE key = 'audio_threshold_multi'")
            .execute(&pool)
            .await
            .unwrap();

        initialize_schema(&pool).await.unwrap();

        let value: String = sqlx::query_scalar("SELECT value FROM config WHERE key = 'audio_threshold_multi'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(value, "9999");
    }

    #[tokio::test]
    async fn schema_version_reaches_current() {
        let pool = memory_pool().await;
        initialize_schema(&pool).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
