#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

mod error;
mod processor;
mod queue;
mod speech;
mod task;
mod types;

pub use error::QueueError;
pub use processor::{FnProcessor, TaskProcessor, processor_fn};
pub use queue::TaskQueue;
pub use speech::{SPEECH_TASK_KIND, SpeechEnqueueResult, SpeechQueue, SpeechRequest};
pub use task::{AbortHook, Task, TaskControl};
pub use types::{
    ClearResult, EnqueueResult, QueueStatus, TaskFailure, TaskId, TaskMeta, TaskPromise,
    WaitResult,
};
