use std::sync::Arc;

use crate::config::Config;
use crate::session::{Providers, SessionRegistry};

/// Shared application state for HTTP handlers and the media WebSocket
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub providers: Providers,
}

impl AppState {
    pub fn new(config: Config, providers: Providers) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            providers,
        }
    }
}
