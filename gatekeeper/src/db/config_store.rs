//! Persisted Config key/value access.

use crate::models::config::{setting_type, SettingValue};
use crate::utils::db_retry::retry_on_lock;
use gatekeeper_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Load every persisted Config row, coerced according to [`SETTING_DEFS`].
/// Unknown keys (not in the type table) are skipped rather than failing the
/// whole load — an operator may have left stray rows from an older build.
pub async fn load_all(pool: &SqlitePool) -> Result<HashMap<String, SettingValue>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM config")
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

    let mut map = HashMap::new();
    for (key, value) in rows {
        if let Some(ty) = setting_type(&key) {
            map.insert(key, SettingValue::coerce(ty, &value));
        }
    }
    Ok(map)
}

pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    retry_on_lock("config_set", 5000, || async {
        sqlx::query("INSERT INTO config (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    })
    .await
}
