use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::{CallStatus, CallStore};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::session::TranscriptLine;

/// REST store backend.
pub struct HttpCallStore {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpCallStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build store HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&config.api_key_env).ok(),
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<(), StoreError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Rejected(format!("endpoint returned {status}")))
        }
    }
}

#[async_trait]
impl CallStore for HttpCallStore {
    async fn create_call(&self, call_id: &str, owner_id: Option<&str>) -> Result<(), StoreError> {
        let body = json!({ "call_id": call_id, "owner_id": owner_id });
        self.send(self.http.post(format!("{}/calls", self.api_url)).json(&body))
            .await
    }

    async fn update_call_status(
        &self,
        call_id: &str,
        status: CallStatus,
        duration_secs: f64,
    ) -> Result<(), StoreError> {
        let body = json!({ "status": status.as_str(), "duration_secs": duration_secs });
        self.send(
            self.http
                .patch(format!("{}/calls/{}", self.api_url, call_id))
                .json(&body),
        )
        .await
    }

    async fn save_transcript(
        &self,
        call_id: &str,
        lines: &[TranscriptLine],
    ) -> Result<(), StoreError> {
        let body = json!({ "lines": lines });
        self.send(
            self.http
                .post(format!("{}/calls/{}/transcript", self.api_url, call_id))
                .json(&body),
        )
        .await
    }
}
