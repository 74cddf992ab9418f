//! Port definitions (trait abstractions) for external systems.
//!
//! The pipeline only talks to the speech engine and to audio output through
//! these traits. Concrete adapters live in `speakline-audio`; tests supply
//! their own implementations.
//!
//! # Design Rules
//!
//! - No `reqwest` or `hound` types in any signature
//! - Errors are domain-specific, cloneable where they fan out to several waiters
//! - Traits require `Send + Sync` (or `Send` for per-request sinks)

mod sink;
mod synthesizer;

pub use sink::{AudioSinkFactory, AudioSinkPort, SinkError};
pub use synthesizer::{SynthesisError, SynthesizerPort};
