//! Serialized FIFO task queue.
//!
//! # Concurrency Model
//!
//! - Single long-lived runner per queue (never resets `runner_started`)
//! - `queue_notify` wakes the runner on new work, `idle_notify` wakes
//!   `wait_for_all_tasks` callers when the backlog drains
//! - All state sits behind one `std::sync::Mutex` that is never held across
//!   an `.await`; abort hooks and promise waits run outside the lock
//! - Each task runs in its own spawned future so a panicking processor is
//!   reported as a failure instead of killing the runner

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::processor::TaskProcessor;
use crate::task::{Task, TaskControl};
use crate::types::{
    ClearResult, EnqueueResult, QueueStatus, TaskFailure, TaskId, TaskMeta, TaskPromise,
    WaitResult,
};

/// A task waiting in the backlog.
struct Queued<T> {
    task: Task<T>,
    promise: TaskPromise,
}

/// Handles for the task the runner is processing.
struct InFlight {
    id: TaskId,
    control: TaskControl,
    promise: TaskPromise,
}

struct QueueState<T> {
    pending: VecDeque<Queued<T>>,
    current: Option<InFlight>,
    errors: Vec<TaskFailure>,
}

impl<T> QueueState<T> {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }
}

/// How a dequeued task ended.
enum Outcome {
    Completed,
    Failed(anyhow::Error),
    Aborted,
}

struct Inner<T> {
    state: Mutex<QueueState<T>>,
    processor: Arc<dyn TaskProcessor<T>>,
    queue_notify: Notify,
    idle_notify: Notify,
    runner_started: AtomicBool,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO queue that processes one task at a time.
///
/// Tasks are handed to the injected [`TaskProcessor`] strictly in enqueue
/// order. Every task gets its own promise; processor failures are recorded
/// and reported by [`wait_for_all_tasks`](Self::wait_for_all_tasks) without
/// stopping the backlog.
///
/// The runner is spawned on the first [`enqueue`](Self::enqueue), which must
/// therefore happen inside a Tokio runtime. Dropping the queue stops the
/// runner, aborts the in-flight task and rejects pending ones.
pub struct TaskQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> TaskQueue<T> {
    pub fn new(processor: impl TaskProcessor<T> + 'static) -> Self {
        Self::with_processor(Arc::new(processor))
    }

    pub fn with_processor(processor: Arc<dyn TaskProcessor<T>>) -> Self {
        // Seeded from the clock so ids stay distinct across queue instances.
        let first_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX / 2))
            .unwrap_or(1);

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    current: None,
                    errors: Vec::new(),
                }),
                processor,
                queue_notify: Notify::new(),
                idle_notify: Notify::new(),
                runner_started: AtomicBool::new(false),
                next_id: AtomicU64::new(first_id),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Append a task and make sure the runner is draining the queue.
    ///
    /// Never blocks. The returned `queue_length` counts the tasks that were
    /// already waiting.
    pub fn enqueue(&self, kind: impl Into<String>, data: T) -> EnqueueResult {
        let task_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let meta = TaskMeta {
            id: task_id,
            kind: kind.into(),
            enqueued_at: Utc::now(),
        };
        let promise = TaskPromise::new();

        let queue_length = {
            let mut state = self.inner.lock();
            let waiting = state.pending.len();
            state.pending.push_back(Queued {
                task: Task::new(meta, data, TaskControl::new()),
                promise: promise.clone(),
            });
            waiting
        };
        tracing::debug!(task_id, queue_length, "Task enqueued");

        Inner::ensure_runner(&self.inner);
        self.inner.queue_notify.notify_one();

        EnqueueResult {
            success: true,
            task_id,
            promise,
            queue_length,
        }
    }

    /// Wait until the backlog is empty and nothing is in flight.
    ///
    /// Returns the processor failures recorded since the previous call and
    /// forgets them.
    pub async fn wait_for_all_tasks(&self) -> WaitResult {
        loop {
            let idle = self.inner.idle_notify.notified();
            tokio::pin!(idle);
            // Register before checking so a drain between the check and the
            // await is not missed.
            idle.as_mut().enable();
            if self.inner.lock().is_idle() {
                break;
            }
            idle.await;
        }

        let errors = std::mem::take(&mut self.inner.lock().errors);
        tracing::debug!(errors = errors.len(), "Queue drained");
        WaitResult { errors }
    }

    /// Drop every pending task and abort the one in flight.
    ///
    /// Pending promises reject with [`QueueError::Cleared`]. The in-flight
    /// task is flagged, its abort hook (if any) runs, and this call waits for
    /// its processor to return; its promise rejects with
    /// [`QueueError::Aborted`].
    pub async fn clear(&self) -> ClearResult {
        let (drained, current) = {
            let mut state = self.inner.lock();
            let drained = std::mem::take(&mut state.pending);
            let current = state
                .current
                .as_ref()
                .map(|c| (c.control.clone(), c.promise.clone()));
            (drained, current)
        };

        let removed_count = drained.len();
        for queued in drained {
            queued.task.control().mark_aborted();
            queued.promise.reject(QueueError::Cleared);
        }

        let mut aborted = false;
        if let Some((control, promise)) = current {
            aborted = control.abort();
            // The runner settles the promise once the processor returns.
            let _ = promise.wait().await;
        }

        tracing::info!(removed_count, aborted, "Queue cleared");
        ClearResult {
            removed_count,
            aborted,
        }
    }

    /// Remove specific tasks by id.
    ///
    /// Matching pending tasks reject with [`QueueError::Removed`]. If the
    /// in-flight task is listed it is aborted (hook included) but not awaited.
    pub fn remove(&self, ids: &[TaskId]) -> ClearResult {
        let (removed, current) = {
            let mut state = self.inner.lock();
            let (removed, kept): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|queued| ids.contains(&queued.task.id()));
            state.pending = kept;
            let current = state
                .current
                .as_ref()
                .filter(|c| ids.contains(&c.id))
                .map(|c| c.control.clone());
            (removed, current)
        };

        let aborted = current.is_some_and(|control| control.abort());

        let removed_count = removed.len();
        for queued in removed {
            queued.task.control().mark_aborted();
            queued.promise.reject(QueueError::Removed);
        }

        tracing::debug!(removed_count, aborted, "Tasks removed from queue");
        ClearResult {
            removed_count,
            aborted,
        }
    }

    /// Snapshot of the queue.
    pub fn status(&self) -> QueueStatus {
        let state = self.inner.lock();
        QueueStatus {
            queue_length: state.pending.len(),
            is_processing: state.current.is_some(),
            next_task_id: state.pending.front().map(|q| q.task.id()),
            current_task_id: state.current.as_ref().map(|c| c.id),
        }
    }
}

impl<T: Send + 'static> Inner<T> {
    /// Spawn the runner unless one already exists.
    fn ensure_runner(this: &Arc<Self>) {
        if this
            .runner_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let inner = Arc::clone(this);
            tokio::spawn(async move {
                inner.run_loop().await;
            });
        }
    }

    async fn run_loop(&self) {
        tracing::debug!("Queue runner started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if let Some(queued) = self.begin_next() {
                self.run_task(queued).await;
                continue;
            }

            self.idle_notify.notify_waiters();
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                () = self.queue_notify.notified() => {}
            }
        }
        tracing::debug!("Queue runner stopped");
    }

    /// Pop the next task and mark it current.
    fn begin_next(&self) -> Option<Queued<T>> {
        let mut state = self.lock();
        let queued = state.pending.pop_front()?;
        state.current = Some(InFlight {
            id: queued.task.id(),
            control: queued.task.control().clone(),
            promise: queued.promise.clone(),
        });
        Some(queued)
    }

    async fn run_task(&self, queued: Queued<T>) {
        let Queued { task, promise } = queued;
        let task_id = task.id();
        let kind = task.kind().to_owned();
        let control = task.control().clone();

        let outcome = if control.is_aborted() {
            Outcome::Aborted
        } else {
            tracing::debug!(task_id, kind = %kind, "Task started");
            let processor = Arc::clone(&self.processor);
            let result = match tokio::spawn(async move { processor.process(task).await }).await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("task processor panicked: {join_err}")),
            };

            match result {
                _ if control.is_aborted() => Outcome::Aborted,
                Ok(()) => Outcome::Completed,
                Err(e) => Outcome::Failed(e),
            }
        };

        let mut state = self.lock();
        state.current = None;
        match outcome {
            Outcome::Completed => {
                tracing::debug!(task_id, "Task completed");
                promise.resolve(());
            }
            Outcome::Aborted => {
                tracing::debug!(task_id, "Task aborted");
                promise.reject(QueueError::Aborted);
            }
            Outcome::Failed(e) => {
                tracing::warn!(task_id, kind = %kind, error = %e, "Task failed");
                let error = Arc::new(e);
                state.errors.push(TaskFailure {
                    task_id,
                    kind,
                    error: Arc::clone(&error),
                });
                promise.reject(QueueError::Failed(error));
            }
        }
    }
}

impl<T> Drop for TaskQueue<T> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();

        let drained = {
            let mut state = self.inner.lock();
            if let Some(current) = &state.current {
                current.control.mark_aborted();
            }
            std::mem::take(&mut state.pending)
        };
        for queued in drained {
            queued.promise.reject(QueueError::Cleared);
        }
    }
}

impl<T> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &state.pending.len())
            .field("current", &state.current.as_ref().map(|c| c.id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::processor_fn;
    use std::time::Duration;

    fn noop_queue() -> TaskQueue<u32> {
        TaskQueue::new(processor_fn(|_task: Task<u32>| async { anyhow::Ok(()) }))
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let queue = noop_queue();
        let a = queue.enqueue("test", 1);
        let b = queue.enqueue("test", 2);
        let c = queue.enqueue("test", 3);
        assert!(a.task_id < b.task_id && b.task_id < c.task_id);
        assert!(a.success);
        queue.wait_for_all_tasks().await;
    }

    #[tokio::test]
    async fn wait_on_empty_queue_returns_immediately() {
        let queue = noop_queue();
        let result = tokio::time::timeout(Duration::from_millis(100), queue.wait_for_all_tasks())
            .await
            .unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn status_reports_current_and_next() {
        let queue = TaskQueue::new(processor_fn(|_task: Task<u32>| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            anyhow::Ok(())
        }));

        let first = queue.enqueue("test", 1);
        let second = queue.enqueue("test", 2);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let status = queue.status();
        assert!(status.is_processing);
        assert_eq!(status.current_task_id, Some(first.task_id));
        assert_eq!(status.next_task_id, Some(second.task_id));
        assert_eq!(status.queue_length, 1);

        queue.wait_for_all_tasks().await;
        let status = queue.status();
        assert!(!status.is_processing);
        assert_eq!(status.queue_length, 0);
        assert_eq!(status.current_task_id, None);
    }

    #[tokio::test]
    async fn panicking_processor_is_recorded_as_failure() {
        let queue = TaskQueue::new(processor_fn(|task: Task<u32>| async move {
            assert!(*task.data() != 2, "bad payload");
            anyhow::Ok(())
        }));

        let ok = queue.enqueue("test", 1);
        let bad = queue.enqueue("test", 2);
        let after = queue.enqueue("test", 3);

        let result = queue.wait_for_all_tasks().await;
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].task_id, bad.task_id);
        assert!(ok.promise.wait().await.is_ok());
        assert!(after.promise.wait().await.is_ok());
    }
}
