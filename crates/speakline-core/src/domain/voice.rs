use serde::{Deserialize, Serialize};

/// Speaker and style selection sent with every synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// Engine speaker UUID.
    pub speaker_id: String,
    /// Style ID within the speaker.
    pub style_id: i32,
}

impl VoiceConfig {
    pub fn new(speaker_id: impl Into<String>, style_id: i32) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            style_id,
        }
    }
}
