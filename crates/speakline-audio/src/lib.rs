#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by integration tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tempfile as _;

pub mod generation;
pub mod http;
pub mod processor;
pub mod sink;
pub mod stream;
pub mod text_utils;

pub use generation::{ChunkGenerationManager, GenerationOptions, GenerationStats};
pub use http::{HttpSynthesizer, HttpSynthesizerConfig};
pub use processor::{SpeechPlan, SpeechProcessor};
pub use sink::{CommandPlayerSink, DefaultSinkFactory, WavFileSink};
pub use stream::{AudioStreamController, StreamControllerOptions};
pub use text_utils::{split_into_chunks, strip_markdown};
