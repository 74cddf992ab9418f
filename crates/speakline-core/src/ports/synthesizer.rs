use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AudioResult, Chunk, VoiceConfig};

/// Errors that can occur while producing audio for a chunk.
///
/// Cloneable because one failure is observed both by the chunk's waiter and
/// by the first-chunk gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// The engine answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The engine could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The engine answered with something that is not audio.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No generation task exists (or remains) for this chunk.
    #[error("Generation task not found for chunk {index}")]
    TaskNotFound { index: usize },

    /// Generation was cancelled before it finished.
    #[error("Generation cancelled")]
    Cancelled,

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl SynthesisError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error comes from cancellation rather than a real failure.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Remote (or local) speech engine.
///
/// One call synthesizes one chunk. Implementations must be safe to call
/// concurrently; the generation manager bounds how many calls are in flight.
#[async_trait]
pub trait SynthesizerPort: Send + Sync {
    async fn synthesize(
        &self,
        chunk: &Chunk,
        voice: &VoiceConfig,
        speed: f32,
    ) -> Result<AudioResult, SynthesisError>;
}
