//! Speech synthesis backends.
//!
//! Backends are interchangeable: one `synthesize(text) -> bytes` call per
//! reply, selected once at startup by configuration. Session logic never
//! branches on which backend is in use.

mod http_api;
mod process;

pub use http_api::HttpSynthesizer;
pub use process::ProcessSynthesizer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{TtsBackendKind, TtsConfig};
use crate::error::TurnError;

/// Converts reply text into one buffer of call-ready audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TurnError>;
}

/// Builds the configured synthesizer backend.
pub fn create_synthesizer(config: &TtsConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    match config.backend {
        TtsBackendKind::HttpApi => Ok(Arc::new(HttpSynthesizer::new(config)?)),
        TtsBackendKind::Process => Ok(Arc::new(ProcessSynthesizer::new(config))),
    }
}
