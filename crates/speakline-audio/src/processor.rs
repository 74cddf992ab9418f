//! Turns queued speech requests into audio.
//!
//! For each [`SpeechRequest`] the processor resolves voice and speed, strips
//! markdown, splits the text into chunks and streams the chunk audio into a
//! sink in order. An abort from the queue cancels generation and stops the
//! sink.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt, pin_mut};
use speakline_core::domain::speed::resolve_speed;
use speakline_core::{
    AudioResult, AudioSinkFactory, AudioSinkPort, Chunk, Settings, SynthesisError,
    SynthesizerPort, VoiceConfig,
};
use speakline_queue::{SpeechRequest, Task, TaskProcessor};

use crate::http::HttpSynthesizer;
use crate::sink::DefaultSinkFactory;
use crate::stream::{AudioStreamController, StreamControllerOptions};
use crate::text_utils::{split_into_chunks, strip_markdown};

/// What a request resolves to once settings and per-request options merge.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechPlan {
    pub voice: VoiceConfig,
    pub speed: f32,
    pub chunks: Vec<Chunk>,
    pub stream_options: StreamControllerOptions,
}

/// [`TaskProcessor`] for speech requests.
pub struct SpeechProcessor {
    settings: Settings,
    synthesizer: Arc<dyn SynthesizerPort>,
    sinks: Arc<dyn AudioSinkFactory>,
}

impl SpeechProcessor {
    pub fn new(
        settings: Settings,
        synthesizer: Arc<dyn SynthesizerPort>,
        sinks: Arc<dyn AudioSinkFactory>,
    ) -> Self {
        Self {
            settings,
            synthesizer,
            sinks,
        }
    }

    /// Processor talking HTTP to the configured engine and playing through
    /// the configured player.
    pub fn from_settings(settings: Settings) -> Result<Self, SynthesisError> {
        let synthesizer = Arc::new(HttpSynthesizer::from_settings(&settings)?);
        let sinks = Arc::new(DefaultSinkFactory::new(
            settings.audio.player_command.clone(),
        ));
        Ok(Self::new(settings, synthesizer, sinks))
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve a request against the settings.
    pub fn plan(&self, request: &SpeechRequest) -> SpeechPlan {
        let options = &request.options;
        let voice = self
            .settings
            .voice
            .resolve(options.voice.as_deref(), options.style);
        let speed = resolve_speed(options.factor, options.rate, self.settings.voice.rate);
        let mode = options.chunk_mode.unwrap_or(self.settings.audio.split_mode);
        let text = strip_markdown(&request.text);
        let chunks = split_into_chunks(&text, mode, &self.settings.audio.split_settings);

        SpeechPlan {
            voice,
            speed,
            chunks,
            stream_options: StreamControllerOptions::from(
                &self.settings.audio.parallel_generation,
            ),
        }
    }

    fn controller(&self, request: &SpeechRequest, plan: &SpeechPlan) -> AudioStreamController {
        let mut controller =
            AudioStreamController::new(Arc::clone(&self.synthesizer), plan.stream_options.clone());
        if let Some(parallel) = request.options.parallel_generation {
            if parallel != plan.stream_options.parallel_generation {
                controller.set_parallel_generation_enabled(parallel);
            }
        }
        controller
    }
}

/// Feed the stream into the sink until it ends or fails.
async fn pump(
    stream: impl Stream<Item = Result<AudioResult, SynthesisError>>,
    sink: &mut dyn AudioSinkPort,
) -> anyhow::Result<usize> {
    pin_mut!(stream);
    let mut played = 0;
    while let Some(item) = stream.next().await {
        let result = item.context("speech synthesis failed")?;
        let index = result.index();
        sink.consume(result)
            .await
            .with_context(|| format!("audio output failed on chunk {index}"))?;
        played += 1;
    }
    Ok(played)
}

#[async_trait]
impl TaskProcessor<SpeechRequest> for SpeechProcessor {
    async fn process(&self, task: Task<SpeechRequest>) -> anyhow::Result<()> {
        let request = task.data();
        let plan = self.plan(request);
        if plan.chunks.is_empty() {
            tracing::debug!(task_id = task.id(), "Nothing to speak");
            return Ok(());
        }

        let mut sink = self.sinks.open(request.options.output_file.as_deref())?;
        let controller = Arc::new(self.controller(request, &plan));

        let hook_controller = Arc::clone(&controller);
        task.on_abort(move || hook_controller.clear());

        tracing::info!(
            task_id = task.id(),
            chunks = plan.chunks.len(),
            speaker = %plan.voice.speaker_id,
            style = plan.voice.style_id,
            speed = plan.speed,
            "Speaking"
        );

        let stream = controller.synthesize_stream(plan.chunks, plan.voice, plan.speed);
        let outcome = tokio::select! {
            biased;
            () = task.aborted() => None,
            result = pump(stream, sink.as_mut()) => Some(result),
        };

        match outcome {
            None => {
                sink.abort().await;
                tracing::info!(task_id = task.id(), "Speech aborted");
                Ok(())
            }
            Some(Err(e)) => {
                sink.abort().await;
                Err(e)
            }
            Some(Ok(played)) => {
                sink.finish().await.context("failed to finish audio output")?;
                tracing::info!(task_id = task.id(), chunks = played, "Speech finished");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for SpeechProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechProcessor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
