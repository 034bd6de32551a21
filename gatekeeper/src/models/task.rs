//! Task state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::overrides::Overrides;

/// **[Task status]** one of the eight states a task can occupy. `Processing`
/// and `Uploading` are never legal across a process restart — the
/// Supervisor rewrites them to `Pending`/`PendingUpload` on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    PendingUpload,
    Uploading,
    Uploaded,
    Dirty,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::PendingUpload => "pending_upload",
            TaskStatus::Uploading => "uploading",
            TaskStatus::Uploaded => "uploaded",
            TaskStatus::Dirty => "dirty",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(s: &str) -> Option<TaskStatus> {
        Some(match s {
            "pending" => TaskStatus::Pending,
            "processing" => TaskStatus::Processing,
            "pending_upload" => TaskStatus::PendingUpload,
            "uploading" => TaskStatus::Uploading,
            "uploaded" => TaskStatus::Uploaded,
            "dirty" => TaskStatus::Dirty,
            "error" => TaskStatus::Error,
            "cancelled" => TaskStatus::Cancelled,
            _ => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Uploaded | TaskStatus::Dirty | TaskStatus::Error | TaskStatus::Cancelled
        )
    }
}

/// Which pool (detect or upload) currently owns, or last owned, a task.
///
/// Recorded explicitly rather than inferred solely from the log-substring
/// heuristic the source relied on (see SPEC_FULL.md §9, resolved open
/// question). The heuristic is kept as [`Stage::classify_from_log`] because
/// both the retry and batch operations name it as the classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detect,
    Upload,
}

/// Marker appended to a task's log when it enters the upload stage; used by
/// [`Stage::classify_from_log`] as a fallback classifier.
pub const UPLOAD_STAGE_MARKER: &str = "[upload]";

impl Stage {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Upload => "upload",
        }
    }

    pub fn from_db_str(s: &str) -> Stage {
        if s == "upload" {
            Stage::Upload
        } else {
            Stage::Detect
        }
    }

    /// The heuristic described in SPEC_FULL.md §4.5/§4.7: a row belongs to
    /// the upload stage if its status is `uploading` or its log mentions the
    /// upload marker.
    pub fn classify_from_log(status: TaskStatus, log: &str) -> Stage {
        if status == TaskStatus::Uploading || log.contains(UPLOAD_STAGE_MARKER) {
            Stage::Upload
        } else {
            Stage::Detect
        }
    }
}

/// The unit of work: one file moving through detection and upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub status: TaskStatus,
    pub stage: Stage,
    pub progress: u8,
    pub log: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    #[serde(skip)]
    pub overrides: Overrides,
    pub upload_speed: Option<String>,
    pub upload_eta: Option<String>,
}

impl Task {
    pub fn new(id: i64, filename: String, filepath: String) -> Self {
        Self {
            id,
            filename,
            filepath,
            status: TaskStatus::Pending,
            stage: Stage::Detect,
            progress: 0,
            log: String::new(),
            created_at: Utc::now(),
            finished_at: None,
            retry_count: 0,
            overrides: Overrides::new(),
            upload_speed: None,
            upload_eta: None,
        }
    }

    /// Append a timestamped line to the task's user-visible log.
    pub fn append_log(&mut self, line: impl AsRef<str>) {
        if !self.log.is_empty() {
            self.log.push('\n');
        }
        self.log
            .push_str(&format!("[{}] {}", Utc::now().to_rfc3339(), line.as_ref()));
    }

    /// Move to a new status, resetting progress and, for terminal states,
    /// stamping `finished_at`.
    pub fn transition_to(&mut self, status: TaskStatus) {
        self.status = status;
        self.progress = 0;
        if status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn enter_upload_stage(&mut self) {
        self.stage = Stage::Upload;
        self.append_log(format!("{UPLOAD_STAGE_MARKER} entering upload stage"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_to_terminal_stamps_finished_at() {
        let mut t = Task::new(1, "a.mp4".into(), "/scan/a.mp4".into());
        assert!(t.finished_at.is_none());
        t.transition_to(TaskStatus::Uploaded);
        assert!(t.finished_at.is_some());
        assert_eq!(t.progress, 0);
    }

    #[test]
    fn transition_to_nonterminal_does_not_stamp_finished_at() {
        let mut t = Task::new(1, "a.mp4".into(), "/scan/a.mp4".into());
        t.transition_to(TaskStatus::Processing);
        assert!(t.finished_at.is_none());
    }

    #[test]
    fn stage_classification_prefers_explicit_status() {
        assert_eq!(
            Stage::classify_from_log(TaskStatus::Uploading, "no marker here"),
            Stage::Upload
        );
        assert_eq!(Stage::classify_from_log(TaskStatus::Error, "plain detect failure"), Stage::Detect);
        assert_eq!(
            Stage::classify_from_log(TaskStatus::Error, "[upload] tool exited 1"),
            Stage::Upload
        );
    }

    #[test]
    fn status_db_round_trip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::PendingUpload,
            TaskStatus::Uploading,
            TaskStatus::Uploaded,
            TaskStatus::Dirty,
            TaskStatus::Error,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_db_str(s.as_db_str()), Some(s));
        }
    }

    #[test]
    fn is_terminal_matches_spec_set() {
        assert!(TaskStatus::Uploaded.is_terminal());
        assert!(TaskStatus::Dirty.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::PendingUpload.is_terminal());
        assert!(!TaskStatus::Uploading.is_terminal());
    }
}
