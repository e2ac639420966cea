use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

use super::SpeechSynthesizer;
use crate::config::TtsConfig;
use crate::error::TurnError;

/// REST synthesizer: JSON request in, base64 audio content out.
///
/// The endpoint is asked for u-law at the call's sample rate so the result
/// can be framed onto the wire without transcoding.
pub struct HttpSynthesizer {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    voice: String,
    language_code: String,
    sample_rate: u32,
}

impl HttpSynthesizer {
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build synthesizer HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            voice: config.voice.clone(),
            language_code: config.language_code.clone(),
            sample_rate: config.sample_rate,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TurnError> {
        let body = json!({
            "input": { "text": text },
            "voice": { "languageCode": self.language_code, "name": self.voice },
            "audioConfig": { "audioEncoding": "MULAW", "sampleRateHertz": self.sample_rate },
        });

        let mut request = self.http.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TurnError::SynthesisFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TurnError::SynthesisFailed(format!(
                "endpoint returned {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| TurnError::SynthesisFailed(format!("unreadable response: {e}")))?;

        let content = payload["audioContent"]
            .as_str()
            .ok_or_else(|| TurnError::SynthesisFailed("response carried no audio".to_string()))?;

        let audio = BASE64
            .decode(content)
            .map_err(|e| TurnError::SynthesisFailed(format!("audio is not valid base64: {e}")))?;

        debug!("Synthesized {} bytes of reply audio", audio.len());

        Ok(audio)
    }
}
