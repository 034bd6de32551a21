//! Process-group subprocess supervision.
//!
//! Every external tool (probe/mux tool, upload tool) is spawned in its own
//! process group so that [`GroupChild::cancel`] can terminate the whole
//! subtree with one uncatchable signal instead of orphaning descendants
//! the tool itself forked (SPEC_FULL.md §4.1, §9).

use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("io error spawning process: {0}")]
    Io(#[from] std::io::Error),
    #[error("process timed out after {0:?}")]
    Timeout(Duration),
}

/// A child process running in its own process group, killable as a unit.
pub struct GroupChild {
    child: Child,
    pgid: i32,
}

impl GroupChild {
    /// Spawn `cmd`, placing it in a new process group on unix. On other
    /// platforms the group is just the child itself (no tree to worry
    /// about without unix fork semantics).
    pub fn spawn(mut cmd: Command) -> Result<Self, ProcessError> {
        cmd.stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let child = cmd.spawn()?;
        let pgid = child.id().unwrap_or(0) as i32;
        Ok(Self { child, pgid })
    }

    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    pub fn stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    pub fn stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }

    /// Kill the entire process group with SIGKILL (unix) or the child
    /// itself (other platforms). Safe to call more than once.
    pub fn cancel(&self) {
        #[cfg(unix)]
        {
            if self.pgid > 0 {
                unsafe {
                    libc::kill(-self.pgid, libc::SIGKILL);
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.pgid;
        }
    }

    /// Wait for exit, bounded by `timeout`. On timeout the process group is
    /// killed before returning the error, so callers never need a separate
    /// cleanup step.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<std::process::ExitStatus, ProcessError> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(_) => {
                warn!(pgid = self.pgid, ?timeout, "process timed out, killing group");
                self.cancel();
                let _ = self.child.wait().await;
                Err(ProcessError::Timeout(timeout))
            }
        }
    }
}

impl Drop for GroupChild {
    fn drop(&mut self) {
        // Best-effort: if the caller never awaited completion (e.g. an
        // early cancellation path), don't leave the group running.
        if let Ok(None) = self.child.try_wait() {
            self.cancel();
        }
    }
}

/// Kill a process group by id, independent of any [`GroupChild`] handle —
/// used by the worker's `running` registry, which only keeps the pgid (a
/// plain `i32`) rather than the non-`Clone` child object.
pub fn kill_process_group(pgid: i32) {
    #[cfg(unix)]
    {
        if pgid > 0 {
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pgid;
    }
}

/// Build a [`Command`] with stdout/stderr piped, used by every Media
/// Toolkit operation that needs to read tool output.
pub fn piped_command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd
}
