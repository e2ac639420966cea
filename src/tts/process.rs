use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::SpeechSynthesizer;
use crate::config::TtsConfig;
use crate::error::TurnError;

/// Maximum text input accepted for synthesis. Oversized requests are
/// rejected before a process is spawned.
const MAX_INPUT_BYTES: usize = 64 * 1024;

/// Local-process synthesizer.
///
/// Spawns an espeak-ng-compatible binary that writes WAV to stdout; the
/// 44-byte WAV header is stripped to yield raw audio bytes.
pub struct ProcessSynthesizer {
    binary: String,
    voice: String,
    timeout: Duration,
}

impl ProcessSynthesizer {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            voice: config.voice.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ProcessSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TurnError> {
        if text.len() > MAX_INPUT_BYTES {
            return Err(TurnError::SynthesisFailed(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_INPUT_BYTES
            )));
        }

        let child = Command::new(&self.binary)
            .arg("--stdout")
            .arg("-v")
            .arg(&self.voice)
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TurnError::SynthesisFailed(format!("failed to spawn {}: {e}", self.binary)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                TurnError::SynthesisFailed(format!(
                    "process timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| TurnError::SynthesisFailed(format!("failed to wait for process: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TurnError::SynthesisFailed(format!(
                "{} failed: {stderr}",
                self.binary
            )));
        }

        debug!("Process synthesizer produced {} bytes", output.stdout.len());

        // Strip the WAV header when present.
        let audio = output.stdout;
        if audio.len() > 44 && audio.starts_with(b"RIFF") {
            Ok(audio[44..].to_vec())
        } else {
            Ok(audio)
        }
    }
}
