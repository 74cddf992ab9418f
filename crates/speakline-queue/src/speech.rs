//! Speech-request queue.

use std::path::PathBuf;

use speakline_core::SpeechOptions;

use crate::processor::TaskProcessor;
use crate::queue::TaskQueue;
use crate::types::{ClearResult, EnqueueResult, QueueStatus, TaskId, TaskPromise, WaitResult};

/// Task kind used for speech requests.
pub const SPEECH_TASK_KIND: &str = "speech";

/// Payload of a speech task.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub options: SpeechOptions,
}

/// [`EnqueueResult`] plus the output file the request will write, if any.
#[derive(Debug, Clone)]
pub struct SpeechEnqueueResult {
    pub success: bool,
    pub task_id: TaskId,
    pub promise: TaskPromise,
    pub queue_length: usize,
    pub output_file: Option<PathBuf>,
}

impl SpeechEnqueueResult {
    fn new(result: EnqueueResult, output_file: Option<PathBuf>) -> Self {
        Self {
            success: result.success,
            task_id: result.task_id,
            promise: result.promise,
            queue_length: result.queue_length,
            output_file,
        }
    }
}

/// Serializes speech requests so utterances never overlap.
#[derive(Debug)]
pub struct SpeechQueue {
    queue: TaskQueue<SpeechRequest>,
}

impl SpeechQueue {
    pub fn new(processor: impl TaskProcessor<SpeechRequest> + 'static) -> Self {
        Self {
            queue: TaskQueue::new(processor),
        }
    }

    /// Queue `text` for synthesis with per-request `options`.
    pub fn enqueue_speech(
        &self,
        text: impl Into<String>,
        options: SpeechOptions,
    ) -> SpeechEnqueueResult {
        let output_file = options.output_file.clone();
        let request = SpeechRequest {
            text: text.into(),
            options,
        };
        let result = self.queue.enqueue(SPEECH_TASK_KIND, request);
        SpeechEnqueueResult::new(result, output_file)
    }

    pub async fn wait_for_all_tasks(&self) -> WaitResult {
        self.queue.wait_for_all_tasks().await
    }

    pub async fn clear(&self) -> ClearResult {
        self.queue.clear().await
    }

    pub fn remove(&self, ids: &[TaskId]) -> ClearResult {
        self.queue.remove(ids)
    }

    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }
}
