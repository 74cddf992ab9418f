//! HTTP client for a COEIROINK-compatible synthesis engine.
//!
//! `POST /v1/synthesis` takes a JSON body and answers with a WAV payload.
//! `GET /v1/speakers` is used as a cheap reachability check.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use speakline_core::settings::PaddingSettings;
use speakline_core::{AudioResult, Chunk, Settings, SynthesisError, SynthesizerPort, VoiceConfig};

/// Connection and request parameters for [`HttpSynthesizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSynthesizerConfig {
    /// e.g. `http://localhost:50032`
    pub base_url: String,
    pub timeout: Duration,
    pub synthesis_rate: u32,
    pub padding: PaddingSettings,
    pub volume_scale: f32,
    pub pitch_scale: f32,
    pub intonation_scale: f32,
}

impl HttpSynthesizerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.connection.base_url(),
            timeout: Duration::from_millis(settings.connection.request_timeout_ms),
            synthesis_rate: settings.audio.synthesis_rate,
            padding: settings.audio.padding_settings.clone(),
            volume_scale: settings.voice.volume_scale,
            pitch_scale: settings.voice.pitch_scale,
            intonation_scale: settings.voice.intonation_scale,
        }
    }
}

/// Body of `POST /v1/synthesis`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisRequest<'a> {
    text: &'a str,
    speaker_uuid: &'a str,
    style_id: i32,
    speed_scale: f32,
    volume_scale: f32,
    pitch_scale: f32,
    intonation_scale: f32,
    pre_phoneme_length: f32,
    post_phoneme_length: f32,
    output_sampling_rate: u32,
}

/// [`SynthesizerPort`] backed by the engine's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: HttpSynthesizerConfig,
}

impl HttpSynthesizer {
    pub fn new(config: HttpSynthesizerConfig) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SynthesisError::other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SynthesisError> {
        Self::new(HttpSynthesizerConfig::from_settings(settings))
    }

    pub const fn config(&self) -> &HttpSynthesizerConfig {
        &self.config
    }

    /// Check that the engine answers on `/v1/speakers`.
    pub async fn check_connection(&self) -> Result<(), SynthesisError> {
        let url = format!("{}/v1/speakers", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        tracing::debug!(url = %url, "Engine reachable");
        Ok(())
    }

    /// Silence padding (seconds before, seconds after) for `chunk`.
    ///
    /// Outer edges of the utterance get the full configured padding, inner
    /// chunk boundaries get half. With `first_chunk_only`, only the first
    /// chunk is padded at all.
    fn padding_for(&self, chunk: &Chunk) -> (f32, f32) {
        let padding = &self.config.padding;
        if !padding.enabled || (padding.first_chunk_only && !chunk.is_first) {
            return (0.0, 0.0);
        }
        let pre = if chunk.is_first {
            padding.pre_phoneme_length
        } else {
            padding.pre_phoneme_length / 2.0
        };
        let post = if chunk.is_last {
            padding.post_phoneme_length
        } else {
            padding.post_phoneme_length / 2.0
        };
        (pre, post)
    }
}

fn map_transport_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::network(format!("request timed out: {e}"))
    } else {
        SynthesisError::network(e.to_string())
    }
}

#[async_trait]
impl SynthesizerPort for HttpSynthesizer {
    async fn synthesize(
        &self,
        chunk: &Chunk,
        voice: &VoiceConfig,
        speed: f32,
    ) -> Result<AudioResult, SynthesisError> {
        let (pre_phoneme_length, post_phoneme_length) = self.padding_for(chunk);
        let body = SynthesisRequest {
            text: &chunk.text,
            speaker_uuid: &voice.speaker_id,
            style_id: voice.style_id,
            speed_scale: speed,
            volume_scale: self.config.volume_scale,
            pitch_scale: self.config.pitch_scale,
            intonation_scale: self.config.intonation_scale,
            pre_phoneme_length,
            post_phoneme_length,
            output_sampling_rate: self.config.synthesis_rate,
        };

        let url = format!("{}/v1/synthesis", self.config.base_url);
        tracing::debug!(chunk = chunk.index, chars = chunk.char_len(), "Synthesizing chunk");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(chunk = chunk.index, status = status.as_u16(), body = %detail, "Synthesis rejected");
            return Err(SynthesisError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let audio = response.bytes().await.map_err(map_transport_error)?;
        if audio.is_empty() {
            return Err(SynthesisError::InvalidResponse(
                "engine returned an empty body".to_string(),
            ));
        }

        Ok(AudioResult::new(chunk.clone(), audio.to_vec(), started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer(padding: PaddingSettings) -> HttpSynthesizer {
        let mut config = HttpSynthesizerConfig::from_settings(&Settings::default());
        config.padding = padding;
        HttpSynthesizer::new(config).unwrap()
    }

    #[test]
    fn padding_only_on_first_chunk_by_default() {
        let synth = synthesizer(PaddingSettings::default());

        let first = Chunk::new("a", 0, 3, 0);
        let middle = Chunk::new("b", 1, 3, 0);
        assert_eq!(synth.padding_for(&first), (0.01, 0.005));
        assert_eq!(synth.padding_for(&middle), (0.0, 0.0));
    }

    #[test]
    fn padding_everywhere_halves_inner_edges() {
        let synth = synthesizer(PaddingSettings {
            first_chunk_only: false,
            pre_phoneme_length: 0.02,
            post_phoneme_length: 0.04,
            ..PaddingSettings::default()
        });

        assert_eq!(synth.padding_for(&Chunk::new("b", 1, 3, 0)), (0.01, 0.02));
        assert_eq!(synth.padding_for(&Chunk::new("c", 2, 3, 0)), (0.01, 0.04));
        assert_eq!(synth.padding_for(&Chunk::new("solo", 0, 1, 0)), (0.02, 0.04));
    }

    #[test]
    fn disabled_padding_is_zero() {
        let synth = synthesizer(PaddingSettings {
            enabled: false,
            ..PaddingSettings::default()
        });
        assert_eq!(synth.padding_for(&Chunk::new("a", 0, 1, 0)), (0.0, 0.0));
    }

    #[test]
    fn request_body_uses_engine_field_names() {
        let body = SynthesisRequest {
            text: "hi",
            speaker_uuid: "uuid",
            style_id: 3,
            speed_scale: 1.0,
            volume_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
            pre_phoneme_length: 0.0,
            post_phoneme_length: 0.0,
            output_sampling_rate: 24_000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["speakerUuid"], "uuid");
        assert_eq!(json["styleId"], 3);
        assert_eq!(json["outputSamplingRate"], 24_000);
        assert!(json.get("prePhonemeLength").is_some());
    }
}
