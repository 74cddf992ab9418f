//! Data transfer types returned by queue operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use speakline_core::ResolvablePromise;

use crate::error::QueueError;

/// Monotonic task identifier, unique per queue.
pub type TaskId = u64;

/// Promise settled when a task finishes.
pub type TaskPromise = ResolvablePromise<(), QueueError>;

/// Identity and bookkeeping for a queued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMeta {
    pub id: TaskId,
    /// Free-form task kind, e.g. `"speech"`.
    pub kind: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Result of [`TaskQueue::enqueue`](crate::TaskQueue::enqueue).
#[derive(Debug, Clone)]
pub struct EnqueueResult {
    pub success: bool,
    pub task_id: TaskId,
    /// Settles when this task is done.
    pub promise: TaskPromise,
    /// Tasks that were already waiting, not counting this one.
    pub queue_length: usize,
}

/// Point-in-time view of a queue. Not meant for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_processing: bool,
    pub next_task_id: Option<TaskId>,
    pub current_task_id: Option<TaskId>,
}

/// Result of clearing or removing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearResult {
    /// Pending tasks dropped from the backlog.
    pub removed_count: usize,
    /// Whether an in-flight task's abort hook ran.
    pub aborted: bool,
}

/// A processor failure recorded for [`TaskQueue::wait_for_all_tasks`](crate::TaskQueue::wait_for_all_tasks).
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub kind: String,
    pub error: Arc<anyhow::Error>,
}

/// Failures collected since the previous wait.
#[derive(Debug, Clone, Default)]
pub struct WaitResult {
    pub errors: Vec<TaskFailure>,
}

impl WaitResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
