//! Queues & Workers (C5): bounded-concurrency worker pools draining FIFO
//! queues of task ids, plus the in-memory `running` registry used for
//! cooperative + preemptive cancellation.

pub mod detect_worker;
pub mod upload_worker;

use crate::utils::process::kill_process_group;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// The transient handle a worker registers while it owns a task: a
/// cooperative `_stopped` signal plus the pgid of whichever external tool
/// the worker currently has in flight (if any), so `cancel()` can kill it
/// preemptively. There is no cycle with the Task Store — this holds only a
/// process id, never a reference back into persisted data.
#[derive(Clone)]
pub struct TaskHandle {
    cancel_token: CancellationToken,
    active_pgid: Arc<Mutex<Option<i32>>>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            active_pgid: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Record the pgid of a subprocess this task is about to wait on, so a
    /// concurrent `cancel()` can kill it. Call with `None` once the
    /// subprocess exits.
    pub async fn set_active_pgid(&self, pgid: Option<i32>) {
        *self.active_pgid.lock().await = pgid;
    }

    /// Cooperative signal: checked between pipeline steps.
    pub fn stop_signal(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    async fn cancel(&self) {
        self.cancel_token.cancel();
        if let Some(pgid) = *self.active_pgid.lock().await {
            kill_process_group(pgid);
        }
    }
}

/// `running[id]` — a weak reference used only for cancellation (SPEC_FULL.md
/// §3, §9). At most one worker holds a given task id at a time.
#[derive(Clone, Default)]
pub struct Running(Arc<RwLock<HashMap<i64, TaskHandle>>>);

impl Running {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh handle for `id` before work begins. Returns the
    /// handle the worker should thread through the pipeline.
    pub async fn register(&self, id: i64) -> TaskHandle {
        let handle = TaskHandle::new();
        self.0.write().await.insert(id, handle.clone());
        handle
    }

    /// Guaranteed-release step: remove the entry on any exit path.
    pub async fn deregister(&self, id: i64) {
        self.0.write().await.remove(&id);
    }

    /// Cancel a running task's handle, if any is registered. Returns
    /// whether anything was cancelled.
    pub async fn cancel(&self, id: i64) -> bool {
        let handle = self.0.read().await.get(&id).cloned();
        match handle {
            Some(handle) => {
                handle.cancel().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, id: i64) -> bool {
        self.0.read().await.contains_key(&id)
    }
}

/// One FIFO of task ids, shared across a worker pool. Built on an
/// unbounded `mpsc` channel with the receiving half behind a mutex so any
/// idle worker in the pool can take the next id (queue.take() is the
/// suspension point named in SPEC_FULL.md §5).
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<i64>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<i64>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    pub fn enqueue(&self, id: i64) {
        // Only fails if every receiver has been dropped, which only
        // happens at process shutdown; nothing useful to do with the id.
        let _ = self.sender.send(id);
    }

    pub async fn take(&self) -> Option<i64> {
        self.receiver.lock().await.recv().await
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_is_fifo() {
        let q = TaskQueue::new();
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.take().await, Some(1));
        assert_eq!(q.take().await, Some(2));
        assert_eq!(q.take().await, Some(3));
    }

    #[tokio::test]
    async fn register_then_cancel_marks_handle_cancelled() {
        let running = Running::new();
        let handle = running.register(42).await;
        assert!(!handle.is_cancelled());

        let cancelled = running.cancel(42).await;
        assert!(cancelled);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_a_no_op() {
        let running = Running::new();
        assert!(!running.cancel(999).await);
    }

    #[tokio::test]
    async fn deregister_removes_from_running() {
        let running = Running::new();
        running.register(1).await;
        assert!(running.is_running(1).await);
        running.deregister(1).await;
        assert!(!running.is_running(1).await);
    }
}
