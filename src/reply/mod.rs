//! Reply generation for finalized caller turns.

mod chat_api;

pub use chat_api::ChatApiGenerator;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ReplyConfig;
use crate::error::TurnError;

/// One completed exchange: a caller utterance and the reply it received, if
/// any. Passed as conversation context to the generator.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub caller: String,
    pub reply: Option<String>,
}

/// Produces reply text for the latest caller utterance.
///
/// Implementations may suspend for the duration of an external round trip
/// and must tolerate being abandoned mid-flight; the session drops the
/// future on barge-in and discards any late result.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, history: &[Exchange], latest: &str) -> Result<String, TurnError>;
}

/// Builds the configured generator backend.
pub fn create_generator(config: &ReplyConfig) -> Result<Arc<dyn ReplyGenerator>> {
    Ok(Arc::new(ChatApiGenerator::new(config)?))
}
