//! Call-record store collaborator.
//!
//! The store is an external request/response service: it is told when a call
//! starts and stops and receives the finalized transcript at teardown. Store
//! failures are logged by callers and never fatal to a session.

mod http_api;
mod memory;

pub use http_api::HttpCallStore;
pub use memory::MemoryCallStore;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{StoreBackendKind, StoreConfig};
use crate::error::StoreError;
use crate::session::TranscriptLine;

/// Lifecycle status of a call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    InProgress,
    Completed,
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::InProgress => "in_progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
        }
    }
}

#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create_call(&self, call_id: &str, owner_id: Option<&str>) -> Result<(), StoreError>;

    async fn update_call_status(
        &self,
        call_id: &str,
        status: CallStatus,
        duration_secs: f64,
    ) -> Result<(), StoreError>;

    async fn save_transcript(
        &self,
        call_id: &str,
        lines: &[TranscriptLine],
    ) -> Result<(), StoreError>;
}

/// Builds the configured store backend.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn CallStore>> {
    match config.backend {
        StoreBackendKind::Memory => Ok(Arc::new(MemoryCallStore::new())),
        StoreBackendKind::HttpApi => Ok(Arc::new(HttpCallStore::new(config)?)),
    }
}
