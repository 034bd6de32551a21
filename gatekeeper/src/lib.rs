//! gatekeeper library interface for testing and for the `gatekeeper` binary.

pub mod api;
pub mod db;
pub mod detect;
pub mod error;
pub mod media;
pub mod models;
pub mod notify;
pub mod queue;
pub mod supervisor;
pub mod transcriber;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use crate::media::MediaToolkit;
use crate::queue::{Running, TaskQueue};
use crate::transcriber::Transcriber;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state: the Task Store pool, the two FIFOs workers
/// drain, the `running` cancellation registry, and the C1/C2 adapters —
/// everything a C7 handler or a worker needs, bundled once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub detect_queue: TaskQueue,
    pub upload_queue: TaskQueue,
    pub running: Running,
    pub toolkit: Arc<dyn MediaToolkit>,
    pub transcriber: Arc<dyn Transcriber>,
    pub notify_client: reqwest::Client,
    pub scan_root: PathBuf,
    pub api_token: String,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::schema::initialize_schema;
    use crate::media::{AudioStream, MediaResult, StreamMap, UploadEvent};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::Path;
    use tokio::sync::mpsc;

    struct NoopToolkit;

    #[async_trait]
    impl MediaToolkit for NoopToolkit {
        async fn probe_duration(&self, _path: &Path) -> MediaResult<f64> {
            Ok(0.0)
        }
        async fn probe_audio_streams(&self, _path: &Path) -> MediaResult<Vec<AudioStream>> {
            Ok(vec![])
        }
        async fn probe_subtitle_indices(&self, _path: &Path) -> MediaResult<Vec<usize>> {
            Ok(vec![])
        }
        async fn extract_subtitle_as_webvtt(&self, _path: &Path, _stream_id: usize) -> MediaResult<String> {
            Ok(String::new())
        }
        async fn extract_audio_segment(
            &self,
            _path: &Path,
            _start_s: f64,
            _duration_s: f64,
            _out_wav: &Path,
            _audio_map: usize,
        ) -> MediaResult<()> {
            Ok(())
        }
        async fn rewrite_container(
            &self,
            path: &Path,
            _map: &StreamMap,
            _metadata_strip: bool,
        ) -> MediaResult<std::path::PathBuf> {
            Ok(path.to_path_buf())
        }
        async fn probe_format_tags(&self, _path: &Path) -> MediaResult<String> {
            Ok(String::new())
        }
        async fn upload(
            &self,
            _path: &Path,
            _remote_target: &str,
        ) -> MediaResult<(i32, mpsc::UnboundedReceiver<UploadEvent>)> {
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok((0, rx))
        }
    }

    struct NoopTranscriber;

    #[async_trait]
    impl Transcriber for NoopTranscriber {
        async fn transcribe_cloud(
            &self,
            _wav: &Path,
            _cfg: &crate::models::config::RuntimeSettings,
        ) -> crate::transcriber::TranscribeResult {
            Ok((String::new(), crate::transcriber::Provider::Cloud))
        }
        async fn transcribe_local(
            &self,
            _wav: &Path,
            _cfg: &crate::models::config::RuntimeSettings,
        ) -> crate::transcriber::TranscribeResult {
            Ok((String::new(), crate::transcriber::Provider::Local))
        }
    }

    pub(crate) async fn test_state(api_token: &str) -> AppState {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();

        AppState {
            db: pool,
            detect_queue: TaskQueue::new(),
            upload_queue: TaskQueue::new(),
            running: Running::new(),
            toolkit: Arc::new(NoopToolkit),
            transcriber: Arc::new(NoopTranscriber),
            notify_client: reqwest::Client::new(),
            scan_root: PathBuf::from("/scan"),
            api_token: api_token.to_string(),
            started_at: Utc::now(),
        }
    }
}
