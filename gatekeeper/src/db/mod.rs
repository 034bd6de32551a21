pub mod config_store;
pub mod keywords;
pub mod schema;
pub mod tasks;

use gatekeeper_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Open (creating if needed) the SQLite database at `db_path` and bring the
/// schema up to date.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
        .map_err(|e| gatekeeper_common::Error::Config(e.to_string()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new().max_connections(16).connect_with(options).await?;

    schema::initialize_schema(&pool).await?;

    Ok(pool)
}
