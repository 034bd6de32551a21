//! Keyword list persistence. CRUD beyond `list_enabled` is a thin wrapper
//! around the table (SPEC_FULL.md keeps blacklist CRUD ambient, not part of
//! the detection core), but the Detection Engine only ever needs the
//! enabled subset grouped by kind.

use crate::models::keyword::{Keyword, KeywordKind};
use gatekeeper_common::{Error, Result};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    pub audio: Vec<String>,
    pub subtitle: Vec<String>,
    pub meta: Vec<String>,
}

pub async fn load_enabled(pool: &SqlitePool) -> Result<KeywordSet> {
    let rows = sqlx::query("SELECT kind, content FROM keywords WHERE enabled = 1")
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

    let mut set = KeywordSet::default();
    for row in rows {
        let kind: String = row.get("kind");
        let content: String = row.get("content");
        match KeywordKind::from_db_str(&kind) {
            Some(KeywordKind::Audio) => set.audio.push(content),
            Some(KeywordKind::Subtitle) => set.subtitle.push(content),
            Some(KeywordKind::Meta) => set.meta.push(content),
            None => {}
        }
    }
    Ok(set)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Keyword>> {
    let rows = sqlx::query("SELECT id, kind, content, enabled FROM keywords ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

    rows.into_iter()
        .map(|row| {
            let kind: String = row.get("kind");
            Ok(Keyword {
                id: row.get("id"),
                kind: KeywordKind::from_db_str(&kind)
                    .ok_or_else(|| Error::Internal(format!("unknown keyword kind {kind}")))?,
                content: row.get("content"),
                enabled: row.get::<i64, _>("enabled") != 0,
            })
        })
        .collect()
}

pub async fn insert(pool: &SqlitePool, kind: KeywordKind, content: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO keywords (kind, content, enabled) VALUES (?, ?, 1)")
        .bind(kind.as_db_str())
        .bind(content)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
    Ok(result.last_insert_rowid())
}

pub async fn set_enabled(pool: &SqlitePool, id: i64, enabled: bool) -> Result<()> {
    sqlx::query("UPDATE keywords SET enabled = ? WHERE id = ?")
        .bind(enabled as i64)
        .bind(id)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM keywords WHERE id = ?").bind(id).execute(pool).await.map_err(Error::Database)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::initialize_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn load_enabled_groups_by_kind() {
        let pool = setup().await;
        let set = load_enabled(&pool).await.unwrap();
        assert!(set.audio.contains(&"加群".to_string()));
        assert!(set.meta.contains(&"微信号".to_string()));
    }

    #[tokio::test]
    async fn disabled_keyword_excluded_from_load_enabled() {
        let pool = setup().await;
        let id = insert(&pool, KeywordKind::Audio, "testword").await.unwrap();
        set_enabled(&pool, id, false).await.unwrap();

        let set = load_enabled(&pool).await.unwrap();
        assert!(!set.audio.contains(&"testword".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let pool = setup().await;
        let id = insert(&pool, KeywordKind::Meta, "tempword").await.unwrap();
        delete(&pool, id).await.unwrap();

        let all = list_all(&pool).await.unwrap();
        assert!(!all.iter().any(|k| k.id == id));
    }
}
