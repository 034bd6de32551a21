//! Container rewrite: remux a file down to the surviving stream map,
//! stripping container-level metadata tags, then verify the result before
//! it replaces the original (SPEC_FULL.md §4.1).

use super::{MediaError, MediaResult, StreamMap};
use crate::utils::process::{piped_command, GroupChild};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const MIN_VALID_SIZE_BYTES: u64 = 1024;

pub async fn rewrite_container(
    tool: &str,
    path: &Path,
    map: &StreamMap,
    metadata_strip: bool,
) -> MediaResult<PathBuf> {
    let tmp_path = tmp_sibling(path);

    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), path.to_string_lossy().into_owned()];
    for idx in map.video.iter().chain(map.audio.iter()).chain(map.subtitles.iter()) {
        args.push("-map".into());
        args.push(format!("0:{idx}"));
    }
    if metadata_strip {
        args.push("-map_metadata".into());
        args.push("-1".into());
    }
    args.push("-c".into());
    args.push("copy".into());
    args.push(tmp_path.to_string_lossy().into_owned());

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = piped_command(tool, &arg_refs);
    let mut child = GroupChild::spawn(cmd).map_err(|e| MediaError::ToolFailed(e.to_string()))?;
    let status = child
        .wait_timeout(Duration::from_secs(300))
        .await
        .map_err(|e| match e {
            crate::utils::process::ProcessError::Timeout(_) => MediaError::Timeout,
            other => MediaError::ToolFailed(other.to_string()),
        })?;

    if !status.success() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(MediaError::ToolFailed(format!("rewrite of {} failed", path.display())));
    }

    if let Err(e) = verify_output(tool, &tmp_path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&tmp_path, path).await.map_err(|e| MediaError::ToolFailed(e.to_string()))?;

    Ok(path.to_path_buf())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("output");
    let tmp_name = format!(".{file_name}.rewrite.tmp");
    path.with_file_name(tmp_name)
}

/// Integrity check per SPEC_FULL.md §4.1: the rewritten file exists, is at
/// least [`MIN_VALID_SIZE_BYTES`], and probes with a positive duration.
async fn verify_output(tool: &str, path: &Path) -> MediaResult<()> {
    let metadata = tokio::fs::metadata(path).await.map_err(|_| MediaError::IntegrityCheckFailed)?;
    if metadata.len() < MIN_VALID_SIZE_BYTES {
        return Err(MediaError::IntegrityCheckFailed);
    }

    let args = ["-v", "error", "-print_format", "json", "-show_format", &path.to_string_lossy()];
    let cmd = piped_command(tool, &args);
    let mut child = GroupChild::spawn(cmd).map_err(|_| MediaError::IntegrityCheckFailed)?;
    let mut stdout = child.stdout().ok_or(MediaError::IntegrityCheckFailed)?;
    let mut buf = String::new();
    stdout.read_to_string(&mut buf).await.map_err(|_| MediaError::IntegrityCheckFailed)?;
    let _ = child.wait_timeout(Duration::from_secs(10)).await;

    let json: serde_json::Value = serde_json::from_str(&buf).unwrap_or(serde_json::Value::Null);
    let duration = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    if duration > 0.0 {
        Ok(())
    } else {
        Err(MediaError::IntegrityCheckFailed)
    }
}
