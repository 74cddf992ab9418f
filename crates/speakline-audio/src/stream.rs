//! Ordered audio streaming over a [`ChunkGenerationManager`].

use std::sync::Arc;

use async_stream::stream;
use futures_util::Stream;
use speakline_core::settings::ParallelGenerationSettings;
use speakline_core::{AudioResult, Chunk, SynthesisError, SynthesizerPort, VoiceConfig};

use crate::generation::{ChunkGenerationManager, GenerationOptions, GenerationStats};

/// Options for an [`AudioStreamController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamControllerOptions {
    pub generation: GenerationOptions,
    /// Chunks to keep generating ahead of the one being consumed.
    pub buffer_ahead_count: usize,
    /// Use the generation manager. When off, chunks are synthesized one
    /// after another with no look-ahead.
    pub parallel_generation: bool,
}

impl Default for StreamControllerOptions {
    fn default() -> Self {
        Self {
            generation: GenerationOptions {
                delay_between_requests: std::time::Duration::from_millis(50),
                ..GenerationOptions::default()
            },
            buffer_ahead_count: 1,
            parallel_generation: true,
        }
    }
}

impl From<&ParallelGenerationSettings> for StreamControllerOptions {
    fn from(settings: &ParallelGenerationSettings) -> Self {
        Self {
            generation: GenerationOptions::from(settings),
            buffer_ahead_count: settings.buffer_ahead_count,
            parallel_generation: settings.enabled,
        }
    }
}

/// Clears the manager when the stream finishes or is dropped early.
struct ClearOnDrop(Arc<ChunkGenerationManager>);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// Yields chunk audio strictly in index order while generating ahead.
///
/// One controller serves one stream at a time: every stream shares the
/// controller's manager and clears it when done.
pub struct AudioStreamController {
    synthesizer: Arc<dyn SynthesizerPort>,
    options: StreamControllerOptions,
    manager: Arc<ChunkGenerationManager>,
}

impl AudioStreamController {
    pub fn new(synthesizer: Arc<dyn SynthesizerPort>, options: StreamControllerOptions) -> Self {
        let manager = Arc::new(ChunkGenerationManager::new(
            Arc::clone(&synthesizer),
            options.generation.clone(),
        ));
        Self {
            synthesizer,
            options,
            manager,
        }
    }

    /// Stream the audio for `chunks` in order.
    ///
    /// The stream ends after the first error, which is yielded as its last
    /// item. Generation state is discarded when the stream ends or is dropped.
    pub fn synthesize_stream(
        &self,
        chunks: Vec<Chunk>,
        voice: VoiceConfig,
        speed: f32,
    ) -> impl Stream<Item = Result<AudioResult, SynthesisError>> + Send + 'static {
        let parallel = self.options.parallel_generation;
        let buffer_ahead = self.options.buffer_ahead_count;
        let manager = Arc::clone(&self.manager);
        let synthesizer = Arc::clone(&self.synthesizer);
        let total = chunks.len();

        tracing::debug!(
            chunks = total,
            parallel,
            max_concurrency = manager.options().max_concurrency,
            "Starting audio stream"
        );

        stream! {
            if !parallel {
                for chunk in chunks {
                    let index = chunk.index;
                    match synthesizer.synthesize(&chunk, &voice, speed).await {
                        Ok(result) => yield Ok(result),
                        Err(e) => {
                            tracing::warn!(chunk = index, error = %e, "Sequential synthesis failed");
                            yield Err(e);
                            return;
                        }
                    }
                }
                return;
            }

            let _clear = ClearOnDrop(Arc::clone(&manager));
            let mut next_to_start = 0;

            for current in 0..total {
                let window_end = (current + 1 + buffer_ahead).min(total);
                while next_to_start < window_end {
                    let chunk = chunks[next_to_start].clone();
                    if let Err(e) = manager.start_generation(chunk, voice.clone(), speed).await {
                        tracing::warn!(chunk = next_to_start, error = %e, "Could not start generation");
                        yield Err(e);
                        return;
                    }
                    next_to_start += 1;
                }

                match manager.get_result(current).await {
                    Ok(result) => yield Ok(result),
                    Err(e) => {
                        tracing::warn!(chunk = current, error = %e, "Chunk failed, ending stream");
                        yield Err(e);
                        return;
                    }
                }
            }
            tracing::debug!(chunks = total, "Audio stream complete");
        }
    }

    /// Switch between parallel (two in flight) and one-at-a-time generation.
    pub fn set_parallel_generation_enabled(&mut self, enabled: bool) {
        let mut options = self.options.clone();
        options.parallel_generation = enabled;
        options.generation.max_concurrency = if enabled { 2 } else { 1 };
        tracing::info!(
            enabled,
            max_concurrency = options.generation.max_concurrency,
            "Parallel generation toggled"
        );
        self.update_options(options);
    }

    /// Replace the options, rebuilding the generation manager.
    pub fn update_options(&mut self, options: StreamControllerOptions) {
        self.manager.clear();
        self.manager = Arc::new(ChunkGenerationManager::new(
            Arc::clone(&self.synthesizer),
            options.generation.clone(),
        ));
        self.options = options;
        tracing::debug!(options = ?self.options, "Stream controller options updated");
    }

    pub const fn options(&self) -> &StreamControllerOptions {
        &self.options
    }

    pub fn generation_stats(&self) -> GenerationStats {
        self.manager.stats()
    }

    /// Cancel in-flight generation and drop buffered audio.
    pub fn clear(&self) {
        self.manager.clear();
    }
}

impl std::fmt::Debug for AudioStreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStreamController")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
