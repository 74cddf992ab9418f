use std::sync::Arc;

use thiserror::Error;

/// Reasons a queued task's promise is rejected.
///
/// Cloneable so one rejection can be observed by every holder of the promise.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The task was still pending when the whole queue was cleared.
    #[error("Queue cleared")]
    Cleared,

    /// The task was in flight (or flagged) when it was aborted.
    #[error("Task aborted")]
    Aborted,

    /// The task was removed by id before it started.
    #[error("Task removed from queue")]
    Removed,

    /// The processor returned an error.
    #[error("{0}")]
    Failed(Arc<anyhow::Error>),
}

impl QueueError {
    /// Whether the task never ran to completion because of a queue operation.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cleared | Self::Aborted | Self::Removed)
    }
}
