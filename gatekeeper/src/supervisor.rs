//! Supervisor (C6): startup recovery, three-tier settings resolution, and
//! remote-target naming (SPEC_FULL.md §4.6, §6).

use crate::db::config_store;
use crate::models::config::{RuntimeSettings, SettingValue, SETTING_DEFS};
use crate::models::overrides::Overrides;
use crate::queue::TaskQueue;
use gatekeeper_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;

/// Fold `compiled default ← persisted Config ← task overrides` into one
/// [`RuntimeSettings`] — the per-task twin of
/// [`gatekeeper_common::bootstrap::Config::resolve`]'s CLI/env/file/default
/// fold, over a different source list (SPEC_FULL.md §4.6's "ambient"
/// paragraph).
pub async fn resolve_settings(pool: &SqlitePool, task_overrides: &Overrides) -> Result<RuntimeSettings> {
    let mut map: HashMap<String, SettingValue> = config_store::load_all(pool).await?;

    for (key, ty, _) in SETTING_DEFS {
        if let Some(raw) = task_overrides.get_raw(key) {
            if let Some(value) = SettingValue::from_json_value(*ty, raw) {
                map.insert(key.to_string(), value);
            }
        }
    }

    Ok(RuntimeSettings::from_resolved(&map))
}

/// SPEC_FULL.md §6 upload-remote naming: the folder immediately under the
/// scan root becomes the remote prefix, unless it's empty or equal to the
/// root's own basename, in which case the configured default remote wins.
pub fn remote_target(scan_root: &Path, file_path: &Path, default_remote: &str) -> String {
    let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let root_basename = scan_root.file_name().and_then(|n| n.to_str()).unwrap_or("");

    let folder_name = file_path
        .strip_prefix(scan_root)
        .ok()
        .and_then(|rel| rel.components().next())
        .and_then(|c| c.as_os_str().to_str())
        .filter(|name| {
            // A bare filename component (no subfolder) strips to the
            // filename itself, not a folder — only treat it as a prefix if
            // the file is actually nested one level down.
            file_path.strip_prefix(scan_root).map(|rel| rel.components().count() > 1).unwrap_or(false)
                && !name.is_empty()
        });

    let prefix = match folder_name {
        Some(name) if name != root_basename => name,
        _ => default_remote,
    };

    format!("{prefix}:{filename}")
}

/// Re-enqueue every task left `processing`/`pending_upload` by a prior
/// process (SPEC_FULL.md §4.4's startup recovery guarantee).
pub async fn recover_interrupted(
    pool: &SqlitePool,
    detect_queue: &TaskQueue,
    upload_queue: &TaskQueue,
) -> Result<(usize, usize)> {
    let (detect_ids, upload_ids) = crate::db::tasks::rewrite_interrupted_on_startup(pool).await?;
    for id in &detect_ids {
        detect_queue.enqueue(*id);
    }
    for id in &upload_ids {
        upload_queue.enqueue(*id);
    }
    Ok((detect_ids.len(), upload_ids.len()))
}
