use std::future::Future;

use async_trait::async_trait;

use crate::task::Task;

/// Work performed for each dequeued task.
///
/// Errors are recorded by the queue and reject the task's promise; they never
/// stop the runner.
#[async_trait]
pub trait TaskProcessor<T: Send + 'static>: Send + Sync {
    async fn process(&self, task: Task<T>) -> anyhow::Result<()>;
}

/// [`TaskProcessor`] backed by an async closure. Built with [`processor_fn`].
pub struct FnProcessor<F> {
    f: F,
}

/// Wrap an async closure as a [`TaskProcessor`].
pub fn processor_fn<T, F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(Task<T>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnProcessor { f }
}

#[async_trait]
impl<T, F, Fut> TaskProcessor<T> for FnProcessor<F>
where
    T: Send + 'static,
    F: Fn(Task<T>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn process(&self, task: Task<T>) -> anyhow::Result<()> {
        (self.f)(task).await
    }
}
