//! Exponential-backoff retry for the transient `SQLITE_BUSY` ("database is
//! locked") condition. SQLite serializes writers even under WAL, so every
//! worker, the API adapter, and the Supervisor route their writes through
//! this helper rather than failing on first contention.

use gatekeeper_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(Error::Database(sqlx::Error::Database(ref db_err)))
                if db_err.message().contains("database is locked") =>
            {
                let elapsed = start.elapsed();
                if elapsed >= Duration::from_millis(max_wait_ms) {
                    error!(operation = operation_name, elapsed_ms = elapsed.as_millis() as u64, "giving up after lock contention");
                    return Err(Error::Database(sqlx::Error::Database(db_err.clone())));
                }

                let elapsed_ms = elapsed.as_millis() as u64;
                if elapsed_ms > 5000 {
                    error!(operation = operation_name, elapsed_ms, backoff_ms, "database still locked");
                } else if elapsed_ms > 2000 {
                    warn!(operation = operation_name, elapsed_ms, backoff_ms, "database locked, retrying");
                } else {
                    debug!(operation = operation_name, elapsed_ms, backoff_ms, "database locked, retrying");
                }

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_immediately_when_operation_succeeds() {
        let result = retry_on_lock("test", 1000, || async { Ok::<_, Error>(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn propagates_non_lock_errors_without_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result = retry_on_lock("test", 1000, move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::NotFound("x".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn real_pool_operation_round_trips() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let result = retry_on_lock("test", 1000, || {
            let pool = pool.clone();
            async move {
                sqlx::query("SELECT 1").execute(&pool).await.map_err(Error::Database)?;
                Ok::<_, Error>(())
            }
        })
        .await;
        assert!(result.is_ok());
    }
}
