use std::time::Duration;

use super::Chunk;

/// Synthesized audio for one chunk.
///
/// `audio` holds an encoded WAV payload exactly as returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioResult {
    pub chunk: Chunk,
    pub audio: Vec<u8>,
    /// Wall time spent in the synthesis call.
    pub latency: Duration,
}

impl AudioResult {
    pub const fn new(chunk: Chunk, audio: Vec<u8>, latency: Duration) -> Self {
        Self {
            chunk,
            audio,
            latency,
        }
    }

    /// Index of the chunk this audio belongs to.
    pub const fn index(&self) -> usize {
        self.chunk.index
    }

    /// Size of the buffered audio payload in bytes.
    pub fn byte_len(&self) -> usize {
        self.audio.len()
    }
}
