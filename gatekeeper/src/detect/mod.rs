//! Detection Engine (C3): for one file, orchestrates metadata scrub,
//! subtitle scrub, audio sampling, and keyword matching (SPEC_FULL.md
//! §4.3). Stateless between calls — all checkpointing is delegated to
//! [`DetectCallbacks`] so the caller can persist it durably.

pub mod keywords_match;
pub mod normalize;
pub mod plan;

use crate::db::keywords::KeywordSet;
use crate::media::{smart_audio_map, MediaToolkit, StreamMap};
use crate::models::config::RuntimeSettings;
use crate::transcriber::Transcriber;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const RETRY_LIMIT: i32 = 3;

const RECOGNIZED_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "avi", "mov", "wmv", "flv", "rmvb", "ts", "webm", "m4v"];

#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    ReadyToUpload(PathBuf),
    Dirty(String),
    Retryable(String),
    Cancelled,
}

/// Side effects the Detection Engine asks the caller to persist durably:
/// marking a segment as verified clean (so a retry skips it) and recording
/// a scrub-induced rename. Kept out of this module so it stays testable
/// against an in-memory fake rather than a live Task Store.
#[async_trait]
pub trait DetectCallbacks: Send + Sync {
    async fn on_checkpoint(&self, segment_name: &str);
    async fn on_rename(&self, new_path: &Path);
}

#[allow(clippy::too_many_arguments)]
pub async fn process(
    toolkit: &dyn MediaToolkit,
    transcriber: &dyn Transcriber,
    task_id: i64,
    path: &Path,
    cfg: &RuntimeSettings,
    keywords: &KeywordSet,
    passed: &[String],
    retry_count: i32,
    direct_upload: bool,
    stop: &CancellationToken,
    callbacks: &dyn DetectCallbacks,
) -> DetectOutcome {
    if direct_upload {
        return DetectOutcome::ReadyToUpload(path.to_path_buf());
    }

    if !has_recognized_video_extension(path) {
        return DetectOutcome::ReadyToUpload(path.to_path_buf());
    }

    if stop.is_cancelled() {
        return DetectOutcome::Cancelled;
    }

    let mut current_path = path.to_path_buf();

    if cfg.sanitize_metadata && !is_rmvb(&current_path) {
        match scrub_metadata(toolkit, &current_path, keywords).await {
            Ok(Some(())) => {}
            Ok(None) => {}
            Err(outcome) => return outcome,
        }
    }

    if stop.is_cancelled() {
        return DetectOutcome::Cancelled;
    }

    if cfg.check_subtitles {
        match scrub_subtitles(toolkit, &current_path, keywords).await {
            Ok(Some(new_path)) => {
                callbacks.on_rename(&new_path).await;
                current_path = new_path;
            }
            Ok(None) => {}
            Err(outcome) => return outcome,
        }
    }

    if stop.is_cancelled() {
        return DetectOutcome::Cancelled;
    }

    if cfg.check_audio {
        let duration = match toolkit.probe_duration(&current_path).await {
            Ok(d) => d,
            Err(e) => return DetectOutcome::Retryable(format!("probe_duration failed: {e}")),
        };

        if duration > 0.0 {
            let segments = plan::plan_segments(duration, cfg);
            let audio_streams = match toolkit.probe_audio_streams(&current_path).await {
                Ok(s) => s,
                Err(e) => return DetectOutcome::Retryable(format!("probe_audio_streams failed: {e}")),
            };

            if let Some(audio_map) = smart_audio_map(&audio_streams) {
                for segment in segments.iter().filter(|s| !passed.iter().any(|p| p == s.name)) {
                    if stop.is_cancelled() {
                        return DetectOutcome::Cancelled;
                    }

                    match scan_segment(toolkit, transcriber, task_id, &current_path, segment, cfg, keywords, retry_count)
                        .await
                    {
                        Ok(()) => callbacks.on_checkpoint(segment.name).await,
                        Err(outcome) => return outcome,
                    }
                }
            }
        }
    }

    DetectOutcome::ReadyToUpload(current_path)
}

/// Returns `Ok(Some(()))` if a rewrite happened, `Ok(None)` if the file was
/// clean, or `Err(outcome)` on a terminal/retryable result.
async fn scrub_metadata(
    toolkit: &dyn MediaToolkit,
    path: &Path,
    keywords: &KeywordSet,
) -> Result<Option<()>, DetectOutcome> {
    let tags = toolkit
        .probe_format_tags(path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("probe_format_tags failed: {e}")))?;

    if keywords_match::first_match(&tags, &keywords.meta).is_none() {
        return Ok(None);
    }

    let audio = toolkit
        .probe_audio_streams(path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("probe_audio_streams failed: {e}")))?;
    let subtitles = toolkit
        .probe_subtitle_indices(path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("probe_subtitle_indices failed: {e}")))?;

    let map = StreamMap {
        video: vec![0],
        audio: audio.into_iter().map(|s| s.index).collect(),
        subtitles,
    };

    toolkit
        .rewrite_container(path, &map, true)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("metadata rewrite failed: {e}")))?;

    Ok(Some(()))
}

/// Returns `Ok(Some(new_path))` if one or more subtitle tracks were dropped
/// and the file was renamed to the `_clean` sibling, `Ok(None)` if every
/// track was clean, or `Err` on a terminal/retryable result.
async fn scrub_subtitles(
    toolkit: &dyn MediaToolkit,
    path: &Path,
    keywords: &KeywordSet,
) -> Result<Option<PathBuf>, DetectOutcome> {
    let subtitle_indices = toolkit
        .probe_subtitle_indices(path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("probe_subtitle_indices failed: {e}")))?;

    if subtitle_indices.is_empty() {
        return Ok(None);
    }

    let mut clean_indices = Vec::new();
    let mut any_dirty = false;
    for index in subtitle_indices {
        let text = toolkit
            .extract_subtitle_as_webvtt(path, index)
            .await
            .map_err(|e| DetectOutcome::Retryable(format!("subtitle extraction failed: {e}")))?;

        if keywords_match::first_match(&text, &keywords.subtitle).is_some() {
            any_dirty = true;
        } else {
            clean_indices.push(index);
        }
    }

    if !any_dirty {
        return Ok(None);
    }

    let audio = toolkit
        .probe_audio_streams(path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("probe_audio_streams failed: {e}")))?;

    let map = StreamMap { video: vec![0], audio: audio.into_iter().map(|s| s.index).collect(), subtitles: clean_indices };

    toolkit
        .rewrite_container(path, &map, false)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("subtitle rewrite failed: {e}")))?;

    let new_path = clean_sibling_path(path);
    tokio::fs::rename(path, &new_path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("renaming to clean sibling failed: {e}")))?;

    Ok(Some(new_path))
}

async fn scan_segment(
    toolkit: &dyn MediaToolkit,
    transcriber: &dyn Transcriber,
    task_id: i64,
    path: &Path,
    segment: &plan::Segment,
    cfg: &RuntimeSettings,
    keywords: &KeywordSet,
    retry_count: i32,
) -> Result<(), DetectOutcome> {
    let audio_streams = toolkit
        .probe_audio_streams(path)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("probe_audio_streams failed: {e}")))?;
    let audio_map = match smart_audio_map(&audio_streams) {
        Some(m) => m,
        None => return Ok(()),
    };

    let out_wav = std::env::temp_dir().join(format!("scan_{task_id}_{}.wav", segment.name));

    toolkit
        .extract_audio_segment(path, segment.start_s, segment.duration_s, &out_wav, audio_map)
        .await
        .map_err(|e| DetectOutcome::Retryable(format!("extract_audio_segment failed: {e}")))?;

    let transcribe_result = match transcriber.transcribe_cloud(&out_wav, cfg).await {
        Ok(r) => Ok(r),
        Err(cloud_err) => {
            if retry_count >= RETRY_LIMIT && cfg.enable_local_model {
                transcriber.transcribe_local(&out_wav, cfg).await.map_err(|local_err| {
                    format!("cloud_failed: {cloud_err}; local_failed: {local_err}")
                })
            } else {
                Err(format!("cloud_failed: {cloud_err}"))
            }
        }
    };

    let _ = tokio::fs::remove_file(&out_wav).await;

    let (text, _provider) = transcribe_result.map_err(DetectOutcome::Retryable)?;
    let normalized = normalize::normalize_transcript(&text);

    if let Some(hit) = keywords_match::first_match(&normalized, &keywords.audio) {
        return Err(DetectOutcome::Dirty(format!("命中: {hit}")));
    }

    Ok(())
}

fn has_recognized_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RECOGNIZED_VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_rmvb(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("rmvb")).unwrap_or(false)
}

fn clean_sibling_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    path.with_file_name(format!("{stem}_clean.{ext}"))
}
