//! Writes every chunk of a request into one WAV file.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use speakline_core::{AudioResult, AudioSinkPort, SinkError};

enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl Samples {
    fn len(&self) -> usize {
        match self {
            Self::Int(s) => s.len(),
            Self::Float(s) => s.len(),
        }
    }
}

/// Decodes each chunk's WAV payload and writes the concatenated samples on
/// [`finish`](AudioSinkPort::finish).
///
/// All chunks must share the first chunk's sample format. Nothing is written
/// if the sink is aborted.
pub struct WavFileSink {
    path: PathBuf,
    spec: Option<WavSpec>,
    samples: Option<Samples>,
    chunks: usize,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            spec: None,
            samples: None,
            chunks: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, audio: &[u8], index: usize) -> Result<(), SinkError> {
        let reader = WavReader::new(Cursor::new(audio))
            .map_err(|e| SinkError::Format(format!("chunk {index}: {e}")))?;
        let spec = reader.spec();

        match self.spec {
            None => self.spec = Some(spec),
            Some(first) if first != spec => {
                return Err(SinkError::Format(format!(
                    "chunk {index} is {} Hz/{} ch/{} bit, expected {} Hz/{} ch/{} bit",
                    spec.sample_rate,
                    spec.channels,
                    spec.bits_per_sample,
                    first.sample_rate,
                    first.channels,
                    first.bits_per_sample
                )));
            }
            Some(_) => {}
        }

        let decode_err = |e: hound::Error| SinkError::Format(format!("chunk {index}: {e}"));
        let decoded = match spec.sample_format {
            SampleFormat::Int => Samples::Int(
                reader
                    .into_samples::<i32>()
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?,
            ),
            SampleFormat::Float => Samples::Float(
                reader
                    .into_samples::<f32>()
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?,
            ),
        };

        if let Some(existing) = &mut self.samples {
            match (existing, decoded) {
                (Samples::Int(all), Samples::Int(more)) => all.extend(more),
                (Samples::Float(all), Samples::Float(more)) => all.extend(more),
                _ => {
                    return Err(SinkError::Format(format!(
                        "chunk {index} changes the sample format"
                    )));
                }
            }
        } else {
            self.samples = Some(decoded);
        }
        Ok(())
    }
}

fn write_wav(path: &Path, spec: WavSpec, samples: &Samples) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec)?;
    match samples {
        Samples::Int(all) => {
            for &sample in all {
                writer.write_sample(sample)?;
            }
        }
        Samples::Float(all) => {
            for &sample in all {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()
}

fn map_write_error(e: hound::Error) -> SinkError {
    match e {
        hound::Error::IoError(io) => SinkError::Io(io),
        other => SinkError::Format(other.to_string()),
    }
}

#[async_trait]
impl AudioSinkPort for WavFileSink {
    async fn consume(&mut self, result: AudioResult) -> Result<(), SinkError> {
        self.append(&result.audio, result.index())?;
        self.chunks += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        let (Some(spec), Some(samples)) = (self.spec, self.samples.take()) else {
            tracing::warn!(path = %self.path.display(), "No audio received, nothing written");
            return Ok(());
        };

        let path = self.path.clone();
        let sample_count = samples.len();
        tokio::task::spawn_blocking(move || write_wav(&path, spec, &samples))
            .await
            .map_err(|e| SinkError::Io(std::io::Error::other(e)))?
            .map_err(map_write_error)?;

        tracing::info!(
            path = %self.path.display(),
            chunks = self.chunks,
            samples = sample_count,
            "Wrote audio file"
        );
        Ok(())
    }

    async fn abort(&mut self) {
        self.samples = None;
        tracing::debug!(path = %self.path.display(), "WAV output discarded");
    }
}
