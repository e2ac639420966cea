use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CallStatus, CallStore};
use crate::error::StoreError;
use crate::session::TranscriptLine;

/// One stored call record.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub owner_id: Option<String>,
    pub status: CallStatus,
    pub duration_secs: f64,
    pub transcript: Vec<TranscriptLine>,
}

/// In-memory store. The default backend for local runs, and the double the
/// integration tests inspect.
#[derive(Default)]
pub struct MemoryCallStore {
    calls: Mutex<HashMap<String, CallRecord>>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one call record.
    pub async fn call(&self, call_id: &str) -> Option<CallRecord> {
        self.calls.lock().await.get(call_id).cloned()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn create_call(&self, call_id: &str, owner_id: Option<&str>) -> Result<(), StoreError> {
        let mut calls = self.calls.lock().await;
        calls.insert(
            call_id.to_string(),
            CallRecord {
                owner_id: owner_id.map(str::to_string),
                status: CallStatus::InProgress,
                duration_secs: 0.0,
                transcript: Vec::new(),
            },
        );
        Ok(())
    }

    async fn update_call_status(
        &self,
        call_id: &str,
        status: CallStatus,
        duration_secs: f64,
    ) -> Result<(), StoreError> {
        let mut calls = self.calls.lock().await;
        let record = calls
            .get_mut(call_id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown call {call_id}")))?;
        record.status = status;
        record.duration_secs = duration_secs;
        Ok(())
    }

    async fn save_transcript(
        &self,
        call_id: &str,
        lines: &[TranscriptLine],
    ) -> Result<(), StoreError> {
        let mut calls = self.calls.lock().await;
        let record = calls
            .get_mut(call_id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown call {call_id}")))?;
        record.transcript = lines.to_vec();
        Ok(())
    }
}
