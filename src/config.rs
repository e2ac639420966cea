use anyhow::Result;
use serde::Deserialize;

use crate::session::{SessionConfig, SessionTuning};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionTuning,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Call media parameters. The frame format is a fixed external contract:
/// 8 kHz mono u-law, one byte per sample.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    /// Inbound frames buffered per session while the recognizer is slow.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Queue depth of the non-blocking push into the recognizer channel.
    #[serde(default = "default_bridge_capacity")]
    pub bridge_capacity: usize,
}

fn default_sample_rate() -> u32 {
    8000
}

fn default_frame_ms() -> u64 {
    20
}

fn default_buffer_capacity() -> usize {
    256
}

fn default_bridge_capacity() -> usize {
    64
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frame_ms: default_frame_ms(),
            buffer_capacity: default_buffer_capacity(),
            bridge_capacity: default_bridge_capacity(),
        }
    }
}

impl AudioConfig {
    /// Bytes per outbound frame at the wire's one-byte-per-sample encoding.
    pub fn frame_bytes(&self) -> usize {
        (self.sample_rate as u64 * self.frame_ms / 1000) as usize
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyConfig {
    #[serde(default = "default_reply_api_url")]
    pub api_url: String,
    #[serde(default = "default_reply_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_reply_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_reply_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_reply_api_key_env() -> String {
    "CALLSTREAM_REPLY_API_KEY".to_string()
}

fn default_reply_model() -> String {
    "gpt-4".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful voice assistant on a phone call. Keep replies short and speakable."
        .to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            api_url: default_reply_api_url(),
            api_key_env: default_reply_api_key_env(),
            model: default_reply_model(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackendKind {
    HttpApi,
    Process,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_backend")]
    pub backend: TtsBackendKind,
    #[serde(default = "default_tts_api_url")]
    pub api_url: String,
    #[serde(default = "default_tts_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_tts_voice")]
    pub voice: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Binary used by the `process` backend.
    #[serde(default = "default_tts_binary")]
    pub binary_path: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tts_backend() -> TtsBackendKind {
    TtsBackendKind::HttpApi
}

fn default_tts_api_url() -> String {
    "https://texttospeech.googleapis.com/v1/text:synthesize".to_string()
}

fn default_tts_api_key_env() -> String {
    "CALLSTREAM_TTS_API_KEY".to_string()
}

fn default_tts_voice() -> String {
    "en-US-Neural2-C".to_string()
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_tts_binary() -> String {
    "espeak-ng".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: default_tts_backend(),
            api_url: default_tts_api_url(),
            api_key_env: default_tts_api_key_env(),
            voice: default_tts_voice(),
            language_code: default_language_code(),
            sample_rate: default_sample_rate(),
            binary_path: default_tts_binary(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    Memory,
    HttpApi,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackendKind,
    #[serde(default)]
    pub api_url: String,
    #[serde(default = "default_store_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_store_backend() -> StoreBackendKind {
    StoreBackendKind::Memory
}

fn default_store_api_key_env() -> String {
    "CALLSTREAM_STORE_API_KEY".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            api_url: String::new(),
            api_key_env: default_store_api_key_env(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Per-session settings derived from the global configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tuning: self.session.clone(),
            frame_bytes: self.audio.frame_bytes(),
            frame_interval: std::time::Duration::from_millis(self.audio.frame_ms),
            buffer_capacity: self.audio.buffer_capacity,
            bridge_capacity: self.audio.bridge_capacity,
        }
    }
}
