use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One ordered piece of a speech request.
///
/// Chunks are produced by the text splitter and never mutated afterwards.
/// `index` is 0-based and contiguous within a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Text to synthesize.
    pub text: String,
    /// Position of this chunk within its request.
    pub index: usize,
    /// Whether this is the first chunk of the request.
    pub is_first: bool,
    /// Whether this is the last chunk of the request.
    pub is_last: bool,
    /// Number of characters shared with the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// Build the chunk at `index` out of `total` chunks.
    pub fn new(text: impl Into<String>, index: usize, total: usize, overlap: usize) -> Self {
        Self {
            text: text.into(),
            index,
            is_first: index == 0,
            is_last: index + 1 >= total,
            overlap,
        }
    }

    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// How input text is split into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    /// The whole text is one chunk.
    None,
    /// Fixed windows of `small_size` characters.
    Small,
    /// Fixed windows of `medium_size` characters.
    Medium,
    /// Fixed windows of `large_size` characters.
    Large,
    /// Sentence boundaries, merged and split to a target size.
    #[default]
    Punctuation,
}

impl ChunkMode {
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::Punctuation,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Punctuation => "punctuation",
        }
    }
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known [`ChunkMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chunk mode '{0}' (expected none, small, medium, large or punctuation)")]
pub struct ParseChunkModeError(pub String);

impl FromStr for ChunkMode {
    type Err = ParseChunkModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == lowered)
            .ok_or_else(|| ParseChunkModeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_position_flags() {
        let only = Chunk::new("hello", 0, 1, 0);
        assert!(only.is_first && only.is_last);

        let middle = Chunk::new("b", 1, 3, 0);
        assert!(!middle.is_first && !middle.is_last);

        let last = Chunk::new("c", 2, 3, 0);
        assert!(last.is_last);
    }

    #[test]
    fn char_len_counts_characters() {
        let chunk = Chunk::new("こんにちは", 0, 1, 0);
        assert_eq!(chunk.char_len(), 5);
    }

    #[test]
    fn chunk_mode_parses_case_insensitively() {
        assert_eq!("Medium".parse::<ChunkMode>(), Ok(ChunkMode::Medium));
        assert_eq!(" none ".parse::<ChunkMode>(), Ok(ChunkMode::None));
        assert!("huge".parse::<ChunkMode>().is_err());
    }

    #[test]
    fn chunk_mode_serializes_lowercase() {
        let json = serde_json::to_string(&ChunkMode::Punctuation).unwrap();
        assert_eq!(json, "\"punctuation\"");
    }
}
