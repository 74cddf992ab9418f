//! Queue behaviour under failure and cancellation.
//!
//! Processors are plain async closures; each test scripts how long a task
//! runs and whether it fails, then checks promise outcomes and the error
//! list reported by `wait_for_all_tasks`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use speakline_queue::{QueueError, Task, TaskQueue, processor_fn};

/// Payload used by the scripted processors below.
#[derive(Debug, Clone)]
struct Job {
    name: &'static str,
    fail: bool,
    duration: Duration,
}

impl Job {
    const fn ok(name: &'static str) -> Self {
        Self {
            name,
            fail: false,
            duration: Duration::from_millis(5),
        }
    }

    const fn failing(name: &'static str) -> Self {
        Self {
            name,
            fail: true,
            duration: Duration::from_millis(5),
        }
    }

    const fn slow(name: &'static str, millis: u64) -> Self {
        Self {
            name,
            fail: false,
            duration: Duration::from_millis(millis),
        }
    }
}

/// Queue that records the order in which jobs ran.
fn recording_queue() -> (TaskQueue<Job>, Arc<Mutex<Vec<&'static str>>>) {
    let order = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&order);
    let queue = TaskQueue::new(processor_fn(move |task: Task<Job>| {
        let log = Arc::clone(&log);
        async move {
            let job = task.data().clone();
            tokio::time::sleep(job.duration).await;
            log.lock().unwrap().push(job.name);
            if job.fail {
                anyhow::bail!("job {} failed", job.name);
            }
            Ok(())
        }
    }));
    (queue, order)
}

#[tokio::test]
async fn failing_task_does_not_stop_the_backlog() {
    let (queue, order) = recording_queue();

    let a = queue.enqueue("job", Job::ok("A"));
    let b = queue.enqueue("job", Job::failing("B"));
    let c = queue.enqueue("job", Job::ok("C"));

    assert_eq!(a.queue_length, 0);
    assert_eq!(b.queue_length, 1);
    assert_eq!(c.queue_length, 2);

    let result = queue.wait_for_all_tasks().await;

    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    assert!(a.promise.wait().await.is_ok());
    assert!(c.promise.wait().await.is_ok());

    let err = b.promise.wait().await.unwrap_err();
    assert!(matches!(err, QueueError::Failed(_)));
    assert_eq!(err.to_string(), "job B failed");

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].task_id, b.task_id);
    assert_eq!(result.errors[0].kind, "job");
}

#[tokio::test]
async fn errors_are_cleared_after_being_reported() {
    let (queue, _order) = recording_queue();

    queue.enqueue("job", Job::failing("X"));
    assert_eq!(queue.wait_for_all_tasks().await.errors.len(), 1);

    queue.enqueue("job", Job::ok("Y"));
    assert!(queue.wait_for_all_tasks().await.is_success());
}

#[tokio::test]
async fn clear_before_start_rejects_all_pending() {
    let (queue, order) = recording_queue();

    // Enqueued synchronously; the runner has not had a chance to start any.
    let results: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|name| queue.enqueue("job", Job::ok(name)))
        .collect();

    let cleared = queue.clear().await;
    assert_eq!(cleared.removed_count, 3);
    assert!(!cleared.aborted);
    assert_eq!(queue.status().queue_length, 0);

    for result in results {
        let err = result.promise.wait().await.unwrap_err();
        assert!(matches!(err, QueueError::Cleared));
        assert_eq!(err.to_string(), "Queue cleared");
    }

    queue.wait_for_all_tasks().await;
    assert!(order.lock().unwrap().is_empty());
}

#[tokio::test]
async fn clear_aborts_in_flight_task_via_hook() {
    let hook_fired = Arc::new(AtomicBool::new(false));
    let saw_abort = Arc::new(AtomicBool::new(false));

    let hook_flag = Arc::clone(&hook_fired);
    let abort_flag = Arc::clone(&saw_abort);
    let queue = TaskQueue::new(processor_fn(move |task: Task<()>| {
        let hook_flag = Arc::clone(&hook_flag);
        let abort_flag = Arc::clone(&abort_flag);
        async move {
            task.on_abort(move || hook_flag.store(true, Ordering::SeqCst));
            tokio::select! {
                () = task.aborted() => {
                    abort_flag.store(task.is_aborted(), Ordering::SeqCst);
                    Ok(())
                }
                () = tokio::time::sleep(Duration::from_secs(10)) => {
                    anyhow::bail!("abort was never observed")
                }
            }
        }
    }));

    let in_flight = queue.enqueue("speech", ());
    let waiting = queue.enqueue("speech", ());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.status().current_task_id, Some(in_flight.task_id));

    let cleared = tokio::time::timeout(Duration::from_secs(2), queue.clear())
        .await
        .expect("clear waits only for the aborted processor");

    assert!(cleared.aborted);
    assert_eq!(cleared.removed_count, 1);
    assert!(hook_fired.load(Ordering::SeqCst));
    assert!(saw_abort.load(Ordering::SeqCst));

    let err = in_flight.promise.wait().await.unwrap_err();
    assert_eq!(err.to_string(), "Task aborted");
    let err = waiting.promise.wait().await.unwrap_err();
    assert_eq!(err.to_string(), "Queue cleared");

    // Aborted tasks are cancellations, not failures.
    assert!(queue.wait_for_all_tasks().await.is_success());
    assert!(!queue.status().is_processing);
}

#[tokio::test]
async fn clear_without_hook_reports_not_aborted() {
    let queue = TaskQueue::new(processor_fn(|task: Task<()>| async move {
        task.aborted().await;
        anyhow::Ok(())
    }));

    let in_flight = queue.enqueue("job", ());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let cleared = queue.clear().await;
    assert!(!cleared.aborted);
    assert!(matches!(
        in_flight.promise.wait().await,
        Err(QueueError::Aborted)
    ));
}

#[tokio::test]
async fn remove_drops_only_listed_tasks() {
    let (queue, order) = recording_queue();

    let first = queue.enqueue("job", Job::slow("first", 40));
    let second = queue.enqueue("job", Job::ok("second"));
    let third = queue.enqueue("job", Job::ok("third"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let removed = queue.remove(&[second.task_id]);
    assert_eq!(removed.removed_count, 1);
    assert!(!removed.aborted);

    let result = queue.wait_for_all_tasks().await;
    assert!(result.is_success());
    assert_eq!(*order.lock().unwrap(), vec!["first", "third"]);

    assert!(first.promise.wait().await.is_ok());
    assert!(third.promise.wait().await.is_ok());
    let err = second.promise.wait().await.unwrap_err();
    assert_eq!(err.to_string(), "Task removed from queue");
}

#[tokio::test]
async fn queue_keeps_working_after_clear() {
    let (queue, order) = recording_queue();

    queue.enqueue("job", Job::ok("before"));
    queue.clear().await;

    let after = queue.enqueue("job", Job::ok("after"));
    queue.wait_for_all_tasks().await;

    assert!(after.promise.wait().await.is_ok());
    assert_eq!(order.lock().unwrap().last(), Some(&"after"));
}

#[test]
fn enqueue_outside_async_context_via_block_on() {
    tokio_test::block_on(async {
        let (queue, order) = recording_queue();
        let result = queue.enqueue("job", Job::ok("solo"));
        queue.wait_for_all_tasks().await;
        assert!(result.promise.wait().await.is_ok());
        assert_eq!(*order.lock().unwrap(), vec!["solo"]);
    });
}
