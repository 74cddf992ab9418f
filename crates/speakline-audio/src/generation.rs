//! Bounded-parallel chunk generation.
//!
//! [`ChunkGenerationManager`] starts synthesis for individual chunks, keeps at
//! most `max_concurrency` calls in flight and buffers finished audio until the
//! consumer asks for it by index.
//!
//! # Concurrency Model
//!
//! - A `Semaphore` with `max_concurrency` permits bounds in-flight calls. The
//!   permit moves into the spawned synthesis task and is released after the
//!   result has been recorded.
//! - The first-chunk gate is a [`ResolvablePromise`] settled by chunk 0's
//!   completion handler, so later chunks wait without polling.
//! - Active/completed/failed bookkeeping lives behind one `std::sync::Mutex`.
//!   A completion moves an index from `active` to `completed` (or `failed`)
//!   under a single lock, so an index is never in two maps at once.
//! - Every active task carries a lease. Completions whose lease no longer
//!   matches (the state was cleared meanwhile) are discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use speakline_core::settings::ParallelGenerationSettings;
use speakline_core::{
    AudioResult, Chunk, ResolvablePromise, SynthesisError, SynthesizerPort, VoiceConfig,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Settlement signal shared by a task's waiters.
type Settled = ResolvablePromise<(), SynthesisError>;

/// Lease ID for tracking active generation tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LeaseId(u64);

/// Tuning for a [`ChunkGenerationManager`]. Fixed for the manager's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Upper bound on concurrent synthesis calls (at least 1).
    pub max_concurrency: usize,
    /// Pause after each start before the caller may start the next chunk.
    pub delay_between_requests: Duration,
    /// Hold every chunk after the first until chunk 0 has finished.
    pub pause_until_first_complete: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            delay_between_requests: Duration::from_millis(100),
            pause_until_first_complete: true,
        }
    }
}

impl From<&ParallelGenerationSettings> for GenerationOptions {
    fn from(settings: &ParallelGenerationSettings) -> Self {
        Self {
            max_concurrency: settings.max_concurrency.max(1),
            delay_between_requests: Duration::from_millis(settings.delay_between_requests_ms),
            pause_until_first_complete: settings.pause_until_first_complete,
        }
    }
}

/// Snapshot of the manager's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub active_tasks: usize,
    pub completed_results: usize,
    pub failed_results: usize,
    /// Bytes of finished audio waiting to be retrieved.
    pub total_buffered_bytes: usize,
}

/// An in-flight synthesis call.
struct ActiveTask {
    started_at: Instant,
    lease: LeaseId,
    cancel: CancellationToken,
    settled: Settled,
}

struct GenerationState {
    active: HashMap<usize, ActiveTask>,
    completed: HashMap<usize, AudioResult>,
    failed: HashMap<usize, SynthesisError>,
    first_chunk: Settled,
    next_lease: u64,
}

impl GenerationState {
    fn new() -> Self {
        Self {
            active: HashMap::new(),
            completed: HashMap::new(),
            failed: HashMap::new(),
            first_chunk: Settled::new(),
            next_lease: 0,
        }
    }

    fn is_known(&self, index: usize) -> bool {
        self.active.contains_key(&index)
            || self.completed.contains_key(&index)
            || self.failed.contains_key(&index)
    }

    /// Take a finished result, if there is one.
    fn take_finished(&mut self, index: usize) -> Option<Result<AudioResult, SynthesisError>> {
        if let Some(result) = self.completed.remove(&index) {
            return Some(Ok(result));
        }
        self.failed.remove(&index).map(Err)
    }
}

struct Shared {
    state: Mutex<GenerationState>,
    synthesizer: Arc<dyn SynthesizerPort>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, GenerationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a finished synthesis call and wake its waiters.
    fn finish(&self, index: usize, lease: LeaseId, outcome: Result<AudioResult, SynthesisError>) {
        let mut state = self.lock();
        if state.active.get(&index).is_none_or(|task| task.lease != lease) {
            tracing::debug!(chunk = index, "Ignoring stale generation result");
            return;
        }
        let Some(task) = state.active.remove(&index) else {
            return;
        };
        let elapsed_ms = u64::try_from(task.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    chunk = index,
                    elapsed_ms,
                    bytes = result.byte_len(),
                    "Chunk generated"
                );
                state.completed.insert(index, result);
                if index == 0 {
                    state.first_chunk.resolve(());
                }
                task.settled.resolve(());
            }
            Err(e) => {
                tracing::warn!(chunk = index, elapsed_ms, error = %e, "Chunk generation failed");
                if index == 0 {
                    state.first_chunk.reject(e.clone());
                }
                state.failed.insert(index, e.clone());
                task.settled.reject(e);
            }
        }
    }
}

/// Starts chunk synthesis with bounded parallelism and hands results out by index.
///
/// Results are retrieved exactly once: [`get_result`](Self::get_result)
/// evicts what it returns, and asking again for the same index fails with
/// [`SynthesisError::TaskNotFound`].
pub struct ChunkGenerationManager {
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
    options: GenerationOptions,
}

impl ChunkGenerationManager {
    pub fn new(synthesizer: Arc<dyn SynthesizerPort>, options: GenerationOptions) -> Self {
        let max_concurrency = options.max_concurrency.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(GenerationState::new()),
                synthesizer,
            }),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            options: GenerationOptions {
                max_concurrency,
                ..options
            },
        }
    }

    pub const fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Start synthesizing `chunk` in the background.
    ///
    /// Returns once the call has been launched, not when it finishes. Waits
    /// first for chunk 0 (when `pause_until_first_complete` is set and this is
    /// a later chunk) and then for a free concurrency slot, and afterwards
    /// sleeps `delay_between_requests`. Starting an index that is already
    /// active or finished is a no-op.
    ///
    /// Fails only when the gate fails: chunk 0's error is returned if chunk 0
    /// failed, [`SynthesisError::Cancelled`] if the manager was cleared while
    /// waiting.
    pub async fn start_generation(
        &self,
        chunk: Chunk,
        voice: VoiceConfig,
        speed: f32,
    ) -> Result<(), SynthesisError> {
        let index = chunk.index;

        if self.options.pause_until_first_complete && index > 0 {
            let gate = self.shared.lock().first_chunk.clone();
            if gate.is_pending() {
                tracing::debug!(chunk = index, "Waiting for first chunk before starting");
            }
            gate.wait().await?;
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SynthesisError::Cancelled)?;

        let (lease, cancel) = {
            let mut state = self.shared.lock();
            if state.is_known(index) {
                tracing::debug!(chunk = index, "Generation already started");
                return Ok(());
            }
            let lease = LeaseId(state.next_lease);
            state.next_lease += 1;
            let cancel = CancellationToken::new();
            state.active.insert(
                index,
                ActiveTask {
                    started_at: Instant::now(),
                    lease,
                    cancel: cancel.clone(),
                    settled: Settled::new(),
                },
            );
            (lease, cancel)
        };
        tracing::debug!(chunk = index, chars = chunk.char_len(), "Generation started");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(SynthesisError::Cancelled),
                result = shared.synthesizer.synthesize(&chunk, &voice, speed) => result,
            };
            shared.finish(index, lease, outcome);
            drop(permit);
        });

        if !self.options.delay_between_requests.is_zero() {
            tokio::time::sleep(self.options.delay_between_requests).await;
        }
        Ok(())
    }

    /// Retrieve (and evict) the result for `index`, waiting if it is still running.
    pub async fn get_result(&self, index: usize) -> Result<AudioResult, SynthesisError> {
        let settled = {
            let mut state = self.shared.lock();
            if let Some(finished) = state.take_finished(index) {
                return finished;
            }
            match state.active.get(&index) {
                Some(task) => task.settled.clone(),
                None => return Err(SynthesisError::TaskNotFound { index }),
            }
        };

        let outcome = settled.wait().await;

        if let Some(finished) = self.shared.lock().take_finished(index) {
            return finished;
        }
        // Settled without a stored result: cleared meanwhile, or another
        // caller already took it.
        match outcome {
            Err(e) => Err(e),
            Ok(()) => Err(SynthesisError::TaskNotFound { index }),
        }
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.shared.lock().completed.contains_key(&index)
    }

    pub fn is_in_progress(&self, index: usize) -> bool {
        self.shared.lock().active.contains_key(&index)
    }

    /// Wait for every task that is active right now.
    pub async fn wait_for_all_tasks(&self) {
        let pending: Vec<Settled> = self
            .shared
            .lock()
            .active
            .values()
            .map(|task| task.settled.clone())
            .collect();
        join_all(pending.iter().map(Settled::wait)).await;
    }

    /// Cancel in-flight calls and forget all results.
    ///
    /// Waiters on active tasks and on the first-chunk gate are woken with
    /// [`SynthesisError::Cancelled`]. The manager can be reused afterwards.
    pub fn clear(&self) {
        let (active, old_gate, dropped) = {
            let mut state = self.shared.lock();
            let dropped = state.completed.len() + state.failed.len();
            state.completed.clear();
            state.failed.clear();
            let active: Vec<ActiveTask> = state.active.drain().map(|(_, task)| task).collect();
            let old_gate = std::mem::replace(&mut state.first_chunk, Settled::new());
            (active, old_gate, dropped)
        };

        let cancelled = active.len();
        for task in active {
            task.cancel.cancel();
            task.settled.reject(SynthesisError::Cancelled);
        }
        old_gate.reject(SynthesisError::Cancelled);

        if cancelled > 0 || dropped > 0 {
            tracing::debug!(cancelled, dropped, "Generation state cleared");
        }
    }

    pub fn stats(&self) -> GenerationStats {
        let state = self.shared.lock();
        GenerationStats {
            active_tasks: state.active.len(),
            completed_results: state.completed.len(),
            failed_results: state.failed.len(),
            total_buffered_bytes: state.completed.values().map(AudioResult::byte_len).sum(),
        }
    }
}

impl Drop for ChunkGenerationManager {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for ChunkGenerationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkGenerationManager")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Returns the chunk text as audio after a fixed delay.
    struct EchoSynth {
        delay: Duration,
    }

    #[async_trait]
    impl SynthesizerPort for EchoSynth {
        async fn synthesize(
            &self,
            chunk: &Chunk,
            _voice: &VoiceConfig,
            _speed: f32,
        ) -> Result<AudioResult, SynthesisError> {
            tokio::time::sleep(self.delay).await;
            Ok(AudioResult::new(
                chunk.clone(),
                chunk.text.as_bytes().to_vec(),
                self.delay,
            ))
        }
    }

    fn manager(delay_ms: u64) -> ChunkGenerationManager {
        ChunkGenerationManager::new(
            Arc::new(EchoSynth {
                delay: Duration::from_millis(delay_ms),
            }),
            GenerationOptions {
                max_concurrency: 2,
                delay_between_requests: Duration::ZERO,
                pause_until_first_complete: false,
            },
        )
    }

    fn voice() -> VoiceConfig {
        VoiceConfig::new("speaker", 0)
    }

    #[tokio::test]
    async fn result_is_evicted_on_read() {
        let manager = manager(5);
        manager
            .start_generation(Chunk::new("hi", 0, 1, 0), voice(), 1.0)
            .await
            .unwrap();
        assert!(manager.is_in_progress(0));

        let result = manager.get_result(0).await.unwrap();
        assert_eq!(result.audio, b"hi");
        assert!(!manager.is_completed(0));
        assert_eq!(
            manager.get_result(0).await,
            Err(SynthesisError::TaskNotFound { index: 0 })
        );
    }

    #[tokio::test]
    async fn unknown_index_is_not_found() {
        let manager = manager(5);
        assert_eq!(
            manager.get_result(7).await,
            Err(SynthesisError::TaskNotFound { index: 7 })
        );
    }

    #[tokio::test]
    async fn stats_count_buffered_bytes() {
        let manager = manager(1);
        manager
            .start_generation(Chunk::new("abcd", 0, 2, 0), voice(), 1.0)
            .await
            .unwrap();
        manager
            .start_generation(Chunk::new("ef", 1, 2, 0), voice(), 1.0)
            .await
            .unwrap();
        manager.wait_for_all_tasks().await;

        let stats = manager.stats();
        assert_eq!(stats.active_tasks, 0);
        assert_eq!(stats.completed_results, 2);
        assert_eq!(stats.total_buffered_bytes, 6);
        assert!(manager.is_completed(0) && manager.is_completed(1));
    }

    #[tokio::test]
    async fn duplicate_start_is_ignored() {
        let manager = manager(5);
        let chunk = Chunk::new("x", 0, 1, 0);
        manager.start_generation(chunk.clone(), voice(), 1.0).await.unwrap();
        manager.start_generation(chunk, voice(), 1.0).await.unwrap();
        assert_eq!(manager.stats().active_tasks, 1);
        assert!(manager.get_result(0).await.is_ok());
    }

    #[tokio::test]
    async fn clear_cancels_waiters() {
        let manager = Arc::new(manager(10_000));
        manager
            .start_generation(Chunk::new("slow", 0, 1, 0), voice(), 1.0)
            .await
            .unwrap();

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_result(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.clear();

        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Err(SynthesisError::Cancelled));
        assert_eq!(manager.stats(), GenerationStats::default());
    }

    /// Records when each call starts.
    #[derive(Default)]
    struct StartRecorder {
        starts: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl SynthesizerPort for StartRecorder {
        async fn synthesize(
            &self,
            chunk: &Chunk,
            _voice: &VoiceConfig,
            _speed: f32,
        ) -> Result<AudioResult, SynthesisError> {
            self.starts.lock().unwrap().push(Instant::now());
            Ok(AudioResult::new(chunk.clone(), vec![0], Duration::ZERO))
        }
    }

    #[tokio::test]
    async fn starts_are_paced_by_request_delay() {
        let delay = Duration::from_millis(80);
        let synth = Arc::new(StartRecorder::default());
        let manager = ChunkGenerationManager::new(
            Arc::clone(&synth) as Arc<dyn SynthesizerPort>,
            GenerationOptions {
                max_concurrency: 3,
                delay_between_requests: delay,
                pause_until_first_complete: false,
            },
        );

        for index in 0..3 {
            let called = Instant::now();
            manager
                .start_generation(Chunk::new("x", index, 3, 0), voice(), 1.0)
                .await
                .unwrap();
            assert!(called.elapsed() >= delay);
        }
        manager.wait_for_all_tasks().await;

        let starts = synth.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            // Small slack: a start is stamped just after its spawn is polled.
            assert!(pair[1] - pair[0] >= delay - Duration::from_millis(5));
        }
    }

    /// Sets its flag when dropped, unless disarmed by a finished call.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Never finishes in time; reports whether its future was dropped early.
    struct HangingSynth {
        dropped_early: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SynthesizerPort for HangingSynth {
        async fn synthesize(
            &self,
            chunk: &Chunk,
            _voice: &VoiceConfig,
            _speed: f32,
        ) -> Result<AudioResult, SynthesisError> {
            let guard = DropFlag(Arc::clone(&self.dropped_early));
            tokio::time::sleep(Duration::from_secs(5)).await;
            std::mem::forget(guard);
            Ok(AudioResult::new(chunk.clone(), vec![0], Duration::ZERO))
        }
    }

    #[tokio::test]
    async fn clear_drops_in_flight_synthesis() {
        let dropped_early = Arc::new(AtomicBool::new(false));
        let manager = ChunkGenerationManager::new(
            Arc::new(HangingSynth {
                dropped_early: Arc::clone(&dropped_early),
            }),
            GenerationOptions {
                max_concurrency: 1,
                delay_between_requests: Duration::ZERO,
                pause_until_first_complete: false,
            },
        );

        manager
            .start_generation(Chunk::new("slow", 0, 1, 0), voice(), 1.0)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!dropped_early.load(Ordering::SeqCst));

        manager.clear();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(dropped_early.load(Ordering::SeqCst));
        assert!(!manager.is_in_progress(0));
        // The permit came back, so a new call can start right away.
        tokio::time::timeout(
            Duration::from_millis(500),
            manager.start_generation(Chunk::new("again", 0, 1, 0), voice(), 1.0),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
