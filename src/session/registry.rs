//! Process-wide map of live call sessions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::session::SessionHandle;
use crate::error::RegistryError;

#[derive(Default)]
struct Inner {
    by_call: HashMap<String, Arc<SessionHandle>>,
    by_owner: HashMap<String, HashSet<String>>,
}

/// Concurrent registry keyed by call id, with a secondary owner index for
/// cross-call queries. The registry entry is the sole authoritative pointer
/// to a session; adapters remove it when the session's loop exits.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the session produced by `make` under `call_id`.
    ///
    /// The check and insert happen under one write lock (and `make` is
    /// synchronous), so concurrent creates for the same call id see exactly
    /// one winner; the rest fail with [`RegistryError::DuplicateSession`].
    pub async fn create<F>(
        &self,
        call_id: &str,
        make: F,
    ) -> Result<Arc<SessionHandle>, RegistryError>
    where
        F: FnOnce() -> Arc<SessionHandle>,
    {
        let mut inner = self.inner.write().await;

        if inner.by_call.contains_key(call_id) {
            return Err(RegistryError::DuplicateSession(call_id.to_string()));
        }

        let handle = make();
        if let Some(owner) = &handle.owner_id {
            inner
                .by_owner
                .entry(owner.clone())
                .or_default()
                .insert(call_id.to_string());
        }
        inner.by_call.insert(call_id.to_string(), handle.clone());

        info!(call = call_id, owner = ?handle.owner_id, "Registered session");

        Ok(handle)
    }

    pub async fn get(&self, call_id: &str) -> Option<Arc<SessionHandle>> {
        self.inner.read().await.by_call.get(call_id).cloned()
    }

    /// Removes a session, maintaining the owner index.
    pub async fn remove(&self, call_id: &str) -> Option<Arc<SessionHandle>> {
        let mut inner = self.inner.write().await;

        let handle = inner.by_call.remove(call_id)?;
        if let Some(owner) = &handle.owner_id {
            if let Some(calls) = inner.by_owner.get_mut(owner) {
                calls.remove(call_id);
                if calls.is_empty() {
                    inner.by_owner.remove(owner);
                }
            }
        }

        info!(call = call_id, "Removed session");

        Some(handle)
    }

    pub async fn list(&self) -> Vec<Arc<SessionHandle>> {
        self.inner.read().await.by_call.values().cloned().collect()
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Vec<Arc<SessionHandle>> {
        let inner = self.inner.read().await;
        inner
            .by_owner
            .get(owner_id)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call_id| inner.by_call.get(call_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn active_count(&self) -> usize {
        self.inner.read().await.by_call.len()
    }

    /// Signals teardown to every session of one owner. Entries are removed
    /// by their transport adapters once the loops exit. Returns how many
    /// sessions were signalled.
    pub async fn close_for_owner(&self, owner_id: &str) -> usize {
        let sessions = self.list_by_owner(owner_id).await;
        for session in &sessions {
            session.close();
        }
        sessions.len()
    }
}
