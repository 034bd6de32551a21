//! [`MediaToolkit`] implementation wrapping a real probe/mux tool (ffprobe
//! flavor assumed for argument shape) and a real upload tool.

use super::{AudioStream, MediaError, MediaResult, MediaToolkit, StreamMap, UploadEvent};
use crate::utils::process::{piped_command, GroupChild};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

pub struct ExternalMediaToolkit {
    probe_tool: String,
    upload_tool: String,
}

impl ExternalMediaToolkit {
    pub fn new(probe_tool: String, upload_tool: String) -> Self {
        Self { probe_tool, upload_tool }
    }

    async fn run_capturing_stdout(&self, args: &[&str], timeout: Duration) -> MediaResult<String> {
        let cmd = piped_command(&self.probe_tool, args);
        let mut child = GroupChild::spawn(cmd).map_err(|e| MediaError::ToolFailed(e.to_string()))?;
        let mut stdout = child.stdout().ok_or_else(|| MediaError::ToolFailed("no stdout".into()))?;
        let mut buf = String::new();
        let read = stdout.read_to_string(&mut buf);
        tokio::select! {
            result = read => { result.map_err(|e| MediaError::ToolFailed(e.to_string()))?; }
            _ = tokio::time::sleep(timeout) => {
                child.cancel();
                return Err(MediaError::Timeout);
            }
        }
        let status = child.wait_timeout(Duration::from_secs(5)).await;
        match status {
            Ok(s) if s.success() => Ok(buf),
            Ok(_) => Err(MediaError::ToolFailed(buf)),
            Err(_) => Err(MediaError::Timeout),
        }
    }
}

#[async_trait]
impl MediaToolkit for ExternalMediaToolkit {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        let out = self
            .run_capturing_stdout(
                &["-v", "error", "-print_format", "json", "-show_format", &path.to_string_lossy()],
                Duration::from_secs(30),
            )
            .await?;

        let json: serde_json::Value = serde_json::from_str(&out).unwrap_or(serde_json::Value::Null);
        Ok(json
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0))
    }

    async fn probe_audio_streams(&self, path: &Path) -> MediaResult<Vec<AudioStream>> {
        let out = self
            .run_capturing_stdout(
                &[
                    "-v",
                    "error",
                    "-print_format",
                    "json",
                    "-show_streams",
                    "-select_streams",
                    "a",
                    &path.to_string_lossy(),
                ],
                Duration::from_secs(30),
            )
            .await?;

        let json: serde_json::Value = serde_json::from_str(&out).unwrap_or(serde_json::Value::Null);
        let streams = json.get("streams").and_then(|s| s.as_array()).cloned().unwrap_or_default();

        Ok(streams
            .into_iter()
            .filter_map(|s| {
                let index = s.get("index")?.as_u64()? as usize;
                let codec = s.get("codec_name")?.as_str()?.to_string();
                Some(AudioStream { index, codec })
            })
            .collect())
    }

    async fn probe_subtitle_indices(&self, path: &Path) -> MediaResult<Vec<usize>> {
        let out = self
            .run_capturing_stdout(
                &[
                    "-v",
                    "error",
                    "-print_format",
                    "json",
                    "-show_streams",
                    "-select_streams",
                    "s",
                    &path.to_string_lossy(),
                ],
                Duration::from_secs(30),
            )
            .await?;

        let json: serde_json::Value = serde_json::from_str(&out).unwrap_or(serde_json::Value::Null);
        let streams = json.get("streams").and_then(|s| s.as_array()).cloned().unwrap_or_default();

        Ok(streams.into_iter().filter_map(|s| s.get("index")?.as_u64().map(|i| i as usize)).collect())
    }

    async fn extract_subtitle_as_webvtt(&self, path: &Path, stream_id: usize) -> MediaResult<String> {
        let map_arg = format!("0:{stream_id}");
        let args = ["-y", "-i", &path.to_string_lossy(), "-map", &map_arg, "-f", "webvtt", "-"];
        match self.run_capturing_stdout(&args, Duration::from_secs(120)).await {
            Ok(text) => Ok(text),
            // An extraction failure is non-fatal per SPEC_FULL.md §4.3: treat
            // as an empty (clean) track rather than propagating the error.
            Err(MediaError::ToolFailed(_)) | Err(MediaError::Timeout) => Ok(String::new()),
            Err(other) => Err(other),
        }
    }

    async fn extract_audio_segment(
        &self,
        path: &Path,
        start_s: f64,
        duration_s: f64,
        out_wav: &Path,
        audio_map: usize,
    ) -> MediaResult<()> {
        let map_arg = format!("0:{audio_map}");
        let start = start_s.to_string();
        let dur = duration_s.to_string();
        let args = [
            "-y",
            "-ss",
            &start,
            "-t",
            &dur,
            "-i",
            &path.to_string_lossy(),
            "-map",
            &map_arg,
            "-ac",
            "1",
            "-ar",
            "16000",
            "-sample_fmt",
            "s16",
            &out_wav.to_string_lossy(),
        ];

        let cmd = piped_command(&self.probe_tool, &args);
        let mut child = GroupChild::spawn(cmd).map_err(|e| MediaError::ToolFailed(e.to_string()))?;
        let status = child.wait_timeout(Duration::from_secs(60)).await;
        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(_) => Err(MediaError::ToolFailed(format!("extract_audio_segment failed for {}", path.display()))),
            Err(_) => Err(MediaError::Timeout),
        }
    }

    async fn rewrite_container(&self, path: &Path, map: &StreamMap, metadata_strip: bool) -> MediaResult<PathBuf> {
        super::rewrite::rewrite_container(&self.probe_tool, path, map, metadata_strip).await
    }

    async fn probe_format_tags(&self, path: &Path) -> MediaResult<String> {
        let out = self
            .run_capturing_stdout(
                &["-v", "error", "-print_format", "json", "-show_format", &path.to_string_lossy()],
                Duration::from_secs(30),
            )
            .await?;

        let json: serde_json::Value = serde_json::from_str(&out).unwrap_or(serde_json::Value::Null);
        let tags = json.get("format").and_then(|f| f.get("tags")).cloned().unwrap_or(serde_json::Value::Null);

        let mut dump = String::new();
        if let Some(obj) = tags.as_object() {
            for (k, v) in obj {
                dump.push_str(k);
                dump.push('=');
                dump.push_str(&v.to_string());
                dump.push('\n');
            }
        }
        Ok(dump)
    }

    async fn upload(
        &self,
        path: &Path,
        remote_target: &str,
    ) -> MediaResult<(i32, tokio::sync::mpsc::UnboundedReceiver<UploadEvent>)> {
        super::upload::upload(&self.upload_tool, path, remote_target).await
    }
}
