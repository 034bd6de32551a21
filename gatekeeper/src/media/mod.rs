//! Media Toolkit (C1): thin async wrappers around an external probe/mux
//! tool and an external upload tool. All operations spawn their child in
//! its own process group (`crate::utils::process`) so that an in-flight
//! external tool can be killed as a unit on cancellation.

pub mod external;
pub mod rewrite;
pub mod upload;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    pub index: usize,
    pub codec: String,
}

/// A stream selection for [`MediaToolkit::rewrite_container`]: which video,
/// audio, and subtitle stream indices survive the rewrite.
#[derive(Debug, Clone, Default)]
pub struct StreamMap {
    pub video: Vec<usize>,
    pub audio: Vec<usize>,
    pub subtitles: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("probe/mux tool failed: {0}")]
    ToolFailed(String),
    #[error("probe/mux tool timed out")]
    Timeout,
    #[error("rewrite produced an invalid output file")]
    IntegrityCheckFailed,
    #[error("upload tool failed: {0}")]
    UploadFailed(String),
    #[error("cancelled")]
    Cancelled,
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Everything the Detection Engine and upload worker need from an external
/// probe/mux/upload toolchain. Exists as a trait so tests can substitute a
/// fake implementation instead of shelling out to real `ffmpeg`/`rclone`.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    async fn probe_audio_streams(&self, path: &Path) -> MediaResult<Vec<AudioStream>>;

    async fn probe_subtitle_indices(&self, path: &Path) -> MediaResult<Vec<usize>>;

    async fn extract_subtitle_as_webvtt(&self, path: &Path, stream_id: usize) -> MediaResult<String>;

    async fn extract_audio_segment(
        &self,
        path: &Path,
        start_s: f64,
        duration_s: f64,
        out_wav: &Path,
        audio_map: usize,
    ) -> MediaResult<()>;

    async fn rewrite_container(
        &self,
        path: &Path,
        map: &StreamMap,
        metadata_strip: bool,
    ) -> MediaResult<PathBuf>;

    async fn probe_format_tags(&self, path: &Path) -> MediaResult<String>;

    /// Returns the uploader subprocess's pgid (so the caller can register it
    /// with the `running` handle for preemptive cancellation) alongside the
    /// progress event stream.
    async fn upload(
        &self,
        path: &Path,
        remote_target: &str,
    ) -> MediaResult<(i32, tokio::sync::mpsc::UnboundedReceiver<UploadEvent>)>;
}

/// **[Smart audio map]**: skip a leading FLAC stream when an alternate
/// exists — the external transcoder rejects the particular FLAC profile
/// encountered in practice (SPEC_FULL.md §4.1).
pub fn smart_audio_map(streams: &[AudioStream]) -> Option<usize> {
    match streams {
        [] => None,
        [first] => Some(first.index),
        [first, second, ..] => {
            if first.codec.eq_ignore_ascii_case("flac") {
                Some(second.index)
            } else {
                Some(first.index)
            }
        }
    }
}
