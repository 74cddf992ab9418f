#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod promise;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{AudioResult, Chunk, ChunkMode, SpeechOptions, VoiceConfig};
pub use ports::{AudioSinkFactory, AudioSinkPort, SinkError, SynthesisError, SynthesizerPort};
pub use promise::{ResolvablePromise, Settlement};
pub use settings::{Settings, SettingsError};
