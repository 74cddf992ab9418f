//! Tasks as seen by a processor.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::types::{TaskId, TaskMeta};

/// Callback run once when an in-flight task is aborted.
pub type AbortHook = Box<dyn FnOnce() + Send>;

/// Abort signalling shared between the queue and a task's processor.
///
/// The queue flips the flag; the processor observes it (polling
/// [`is_aborted`](Self::is_aborted) or awaiting [`aborted`](Self::aborted))
/// and may register a hook to stop external work promptly.
#[derive(Clone, Default)]
pub struct TaskControl {
    cancel: CancellationToken,
    hook: Arc<Mutex<Option<AbortHook>>>,
}

impl std::fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskControl")
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}

impl TaskControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the task has been aborted.
    pub fn aborted(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Token cancelled on abort, for handing to child work.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register the abort hook, replacing any earlier one.
    pub fn on_abort(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Flag the task as aborted without running the hook.
    pub(crate) fn mark_aborted(&self) {
        self.cancel.cancel();
    }

    /// Flag the task as aborted and run its hook. Returns whether a hook ran.
    pub(crate) fn abort(&self) -> bool {
        self.cancel.cancel();
        let hook = self.hook.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(hook) = hook {
            hook();
            true
        } else {
            false
        }
    }
}

/// A unit of work handed to a [`TaskProcessor`](crate::TaskProcessor).
#[derive(Debug)]
pub struct Task<T> {
    meta: TaskMeta,
    data: T,
    control: TaskControl,
}

impl<T> Task<T> {
    pub(crate) const fn new(meta: TaskMeta, data: T, control: TaskControl) -> Self {
        Self {
            meta,
            data,
            control,
        }
    }

    pub const fn id(&self) -> TaskId {
        self.meta.id
    }

    pub fn kind(&self) -> &str {
        &self.meta.kind
    }

    pub const fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    pub const fn data(&self) -> &T {
        &self.data
    }

    pub const fn control(&self) -> &TaskControl {
        &self.control
    }

    pub fn is_aborted(&self) -> bool {
        self.control.is_aborted()
    }

    /// Resolves once the task has been aborted.
    pub fn aborted(&self) -> WaitForCancellationFuture<'_> {
        self.control.aborted()
    }

    /// Register a hook to run when this task is aborted mid-flight.
    pub fn on_abort(&self, hook: impl FnOnce() + Send + 'static) {
        self.control.on_abort(hook);
    }

    /// Split into payload and control.
    pub fn into_parts(self) -> (TaskMeta, T, TaskControl) {
        (self.meta, self.data, self.control)
    }
}
