use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ChunkMode;

/// Per-request overrides for a speech request.
///
/// Every field is optional; unset fields fall back to the configured
/// [`Settings`](crate::Settings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeechOptions {
    /// Speaker UUID override.
    pub voice: Option<String>,
    /// Style ID override.
    pub style: Option<i32>,
    /// Speech rate in words per minute.
    pub rate: Option<u32>,
    /// Direct speed multiplier. Takes precedence over `rate`.
    pub factor: Option<f32>,
    /// Write a WAV file here instead of playing the audio.
    pub output_file: Option<PathBuf>,
    /// Chunking mode override.
    pub chunk_mode: Option<ChunkMode>,
    /// Parallel generation override.
    pub parallel_generation: Option<bool>,
}
