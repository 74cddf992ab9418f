//! Live playback through an external player process.

use std::process::Stdio;

use async_trait::async_trait;
use speakline_core::{AudioResult, AudioSinkPort, SinkError};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// Plays each chunk by piping its WAV bytes into a fresh player process.
///
/// The command (e.g. `aplay -q -`) must read a WAV stream from stdin.
/// Chunks play back to back: `consume` returns once the player exits.
pub struct CommandPlayerSink {
    argv: Vec<String>,
    current: Option<Child>,
}

impl CommandPlayerSink {
    pub fn new(argv: Vec<String>) -> Result<Self, SinkError> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(SinkError::Player("player command is empty".to_string()));
        }
        Ok(Self {
            argv,
            current: None,
        })
    }

    fn program(&self) -> &str {
        &self.argv[0]
    }

    fn spawn(&self) -> Result<Child, SinkError> {
        Command::new(self.program())
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SinkError::Player(format!("failed to start `{}`: {e}", self.program())))
    }

    async fn kill_current(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "Player already exited");
            }
        }
    }
}

#[async_trait]
impl AudioSinkPort for CommandPlayerSink {
    async fn consume(&mut self, result: AudioResult) -> Result<(), SinkError> {
        let index = result.index();
        let spawned = self.spawn()?;
        let child = self.current.insert(spawned);

        if let Some(mut stdin) = child.stdin.take() {
            // A player that quits early closes the pipe; its exit status decides.
            if let Err(e) = stdin.write_all(&result.audio).await {
                tracing::debug!(chunk = index, error = %e, "Player closed stdin early");
            }
            drop(stdin);
        }

        let status = child.wait().await?;
        self.current = None;

        if !status.success() {
            return Err(SinkError::Player(format!(
                "`{}` exited with {status} on chunk {index}",
                self.argv[0]
            )));
        }
        tracing::debug!(chunk = index, bytes = result.byte_len(), "Chunk played");
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.kill_current().await;
        Ok(())
    }

    async fn abort(&mut self) {
        if self.current.is_some() {
            tracing::info!("Stopping playback");
        }
        self.kill_current().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_command() {
        assert!(CommandPlayerSink::new(Vec::new()).is_err());
        assert!(CommandPlayerSink::new(vec![" ".to_string()]).is_err());
    }
}
