//! Post-upload filesystem garbage collection (SPEC_FULL.md §5): after a
//! successful move-upload, walk up from the source file's parent directory
//! removing empty directories, stopping at (never crossing) the scan root.

use std::path::Path;

/// Remove `dir` and each ancestor that is empty, up to but not including
/// `scan_root`. `dir` must be inside `scan_root`.
pub fn remove_empty_ancestors(dir: &Path, scan_root: &Path) {
    let mut current = dir.to_path_buf();

    while current.starts_with(scan_root) && current != scan_root {
        match std::fs::read_dir(&current) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
            }
            Err(_) => break,
        }

        if std::fs::remove_dir(&current).is_err() {
            break;
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
}
