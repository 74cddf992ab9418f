//! Single-assignment settlement cell.
//!
//! A [`ResolvablePromise`] starts pending and is settled at most once, either
//! resolved with a value or rejected with an error. Any number of clones can
//! observe or await the outcome. Settlement is atomic: when several callers
//! race, exactly one wins and the rest get `false`.

use std::sync::Arc;

use tokio::sync::watch;

/// State of a [`ResolvablePromise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> Settlement<T, E> {
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Externally settled promise shared between a producer and its waiters.
pub struct ResolvablePromise<T, E> {
    tx: Arc<watch::Sender<Settlement<T, E>>>,
}

impl<T, E> Clone for ResolvablePromise<T, E> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T, E> Default for ResolvablePromise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for ResolvablePromise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.tx.borrow() {
            Settlement::Pending => "pending",
            Settlement::Resolved(_) => "resolved",
            Settlement::Rejected(_) => "rejected",
        };
        f.debug_struct("ResolvablePromise")
            .field("state", &state)
            .finish()
    }
}

impl<T, E> ResolvablePromise<T, E> {
    /// Create a pending promise.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(Settlement::Pending)),
        }
    }

    /// Resolve with `value`. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Settlement::Resolved(value))
    }

    /// Reject with `error`. Returns `false` if already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Settlement::Rejected(error))
    }

    fn settle(&self, outcome: Settlement<T, E>) -> bool {
        let mut outcome = Some(outcome);
        self.tx.send_if_modified(|state| {
            if state.is_pending() {
                if let Some(outcome) = outcome.take() {
                    *state = outcome;
                    return true;
                }
            }
            false
        })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.tx.borrow(), Settlement::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(*self.tx.borrow(), Settlement::Rejected(_))
    }

    pub fn is_pending(&self) -> bool {
        self.tx.borrow().is_pending()
    }
}

impl<T: Clone, E: Clone> ResolvablePromise<T, E> {
    /// Current outcome, or `None` while pending.
    pub fn try_get(&self) -> Option<Result<T, E>> {
        match &*self.tx.borrow() {
            Settlement::Pending => None,
            Settlement::Resolved(value) => Some(Ok(value.clone())),
            Settlement::Rejected(error) => Some(Err(error.clone())),
        }
    }

    /// Wait until the promise is settled and return a copy of the outcome.
    pub async fn wait(&self) -> Result<T, E> {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let settled = rx
            .wait_for(|state| !state.is_pending())
            .await
            .expect("promise sender outlives its waiters");
        match &*settled {
            Settlement::Resolved(value) => Ok(value.clone()),
            Settlement::Rejected(error) => Err(error.clone()),
            Settlement::Pending => unreachable!("wait_for returned a pending state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_settlement_wins() {
        let promise: ResolvablePromise<u32, String> = ResolvablePromise::new();
        assert!(promise.is_pending());

        assert!(promise.resolve(1));
        assert!(!promise.resolve(2));
        assert!(!promise.reject("late".into()));

        assert!(promise.is_resolved());
        assert!(!promise.is_rejected());
        assert_eq!(promise.try_get(), Some(Ok(1)));
    }

    #[test]
    fn reject_then_resolve_keeps_rejection() {
        let promise: ResolvablePromise<u32, String> = ResolvablePromise::new();
        assert!(promise.reject("boom".into()));
        assert!(!promise.resolve(7));
        assert_eq!(promise.try_get(), Some(Err("boom".to_string())));
    }

    #[tokio::test]
    async fn waiters_see_late_resolution() {
        let promise: ResolvablePromise<&'static str, ()> = ResolvablePromise::new();
        let waiter = {
            let promise = promise.clone();
            tokio::spawn(async move { promise.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        promise.resolve("done");

        assert_eq!(waiter.await.unwrap(), Ok("done"));
    }

    #[tokio::test]
    async fn wait_after_settlement_returns_immediately() {
        let promise: ResolvablePromise<(), u8> = ResolvablePromise::new();
        promise.reject(3);
        assert_eq!(promise.wait().await, Err(3));
        assert_eq!(promise.clone().wait().await, Err(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_settlers_have_exactly_one_winner() {
        let promise: ResolvablePromise<usize, ()> = ResolvablePromise::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let promise = promise.clone();
                tokio::spawn(async move { promise.resolve(i) })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(promise.is_resolved());
    }
}
