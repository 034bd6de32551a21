//! Upload progress: runs the upload tool in its own process group and
//! parses its newline-delimited JSON progress log (stderr) into
//! [`UploadEvent`]s streamed back to the caller as they arrive.
//!
//! The upload tool is expected to emit progress objects of the shape
//! `{"stats": {"transferring": [{"bytes": N, "size": N}], "speed": "...",
//! "eta": "..."}}` — one per line — while the transfer is in flight
//! (SPEC_FULL.md §4.1). A sentinel event with `percent == -1.0` marks a
//! failed transfer; the receiver closes normally after a successful one.

use super::{MediaError, MediaResult, UploadEvent};
use crate::utils::process::{piped_command, GroupChild};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

pub const UPLOAD_FAILURE_SENTINEL: f64 = -1.0;

pub async fn upload(
    tool: &str,
    path: &Path,
    remote_target: &str,
) -> MediaResult<(i32, mpsc::UnboundedReceiver<UploadEvent>)> {
    let args = [path.to_string_lossy().into_owned(), remote_target.to_string(), "--progress".to_string()];
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = piped_command(tool, &arg_refs);
    let mut child = GroupChild::spawn(cmd).map_err(|e| MediaError::UploadFailed(e.to_string()))?;
    let pgid = child.pgid();
    let stderr = child.stderr().ok_or_else(|| MediaError::UploadFailed("no stderr".into()))?;

    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(event) = parse_progress_line(&line) {
                let _ = tx.send(event);
            }
        }

        let status = child.wait_timeout(std::time::Duration::from_secs(3600)).await;
        match status {
            Ok(s) if s.success() => {
                let _ = tx.send(UploadEvent { percent: 100.0, speed: None, eta: None });
            }
            _ => {
                warn!(target = %remote_target, "upload tool exited without success");
                let _ = tx.send(UploadEvent { percent: UPLOAD_FAILURE_SENTINEL, speed: None, eta: None });
            }
        }
    });

    Ok((pgid, rx))
}

fn parse_progress_line(line: &str) -> Option<UploadEvent> {
    let json: serde_json::Value = serde_json::from_str(line).ok()?;
    let stats = json.get("stats")?;
    let transferring = stats.get("transferring")?.as_array()?.first()?;
    let bytes = transferring.get("bytes")?.as_f64()?;
    let size = transferring.get("size")?.as_f64()?;
    if size <= 0.0 {
        return None;
    }

    let percent = (bytes / size) * 100.0;
    let speed = stats.get("speed").and_then(value_as_string);
    let eta = stats.get("eta").and_then(value_as_string);
    Some(UploadEvent { percent, speed, eta })
}

/// rclone's `--use-json-log` emits `speed`/`eta` as JSON numbers (seconds,
/// bytes/s); other builds of the upload tool emit them as strings. Accept
/// either so a real progress tick never gets silently dropped.
fn value_as_string(value: &serde_json::Value) -> Option<String> {
    value.as_str().map(str::to_string).or_else(|| value.as_f64().map(|n| n.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_progress_line() {
        let line = r#"{"stats":{"transferring":[{"bytes":512,"size":1024}],"speed":"1.2MB/s","eta":"3s"}}"#;
        let event = parse_progress_line(line).unwrap();
        assert_eq!(event.percent, 50.0);
        assert_eq!(event.speed.as_deref(), Some("1.2MB/s"));
        assert_eq!(event.eta.as_deref(), Some("3s"));
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert!(parse_progress_line("not json at all").is_none());
        assert!(parse_progress_line(r#"{"stats":{}}"#).is_none());
    }

    #[test]
    fn parses_numeric_speed_and_eta() {
        let line = r#"{"stats":{"transferring":[{"bytes":256,"size":1024}],"speed":1258291.2,"eta":42}}"#;
        let event = parse_progress_line(line).unwrap();
        assert_eq!(event.percent, 25.0);
        assert_eq!(event.speed.as_deref(), Some("1258291.2"));
        assert_eq!(event.eta.as_deref(), Some("42"));
    }

    #[test]
    fn ignores_zero_size_transfer() {
        let line = r#"{"stats":{"transferring":[{"bytes":0,"size":0}]}}"#;
        assert!(parse_progress_line(line).is_none());
    }
}
