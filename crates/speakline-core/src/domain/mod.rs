//! Domain types for the speech pipeline.
//!
//! These are plain data types with no I/O. They flow from the chunker through
//! the synthesizer to the audio sinks.

mod audio;
mod chunk;
mod options;
pub mod speed;
mod voice;

pub use audio::AudioResult;
pub use chunk::{Chunk, ChunkMode, ParseChunkModeError};
pub use options::SpeechOptions;
pub use voice::VoiceConfig;
