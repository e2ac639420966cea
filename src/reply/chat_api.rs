use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Exchange, ReplyGenerator};
use crate::config::ReplyConfig;
use crate::error::TurnError;

/// Chat-completion generator against an OpenAI-compatible endpoint.
pub struct ChatApiGenerator {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl ChatApiGenerator {
    pub fn new(config: &ReplyConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build reply HTTP client")?;

        // The key comes from the environment, never from config files.
        let api_key = std::env::var(&config.api_key_env).ok();

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            timeout,
        })
    }

    fn messages(&self, history: &[Exchange], latest: &str) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": self.system_prompt})];
        for exchange in history {
            messages.push(json!({"role": "user", "content": exchange.caller}));
            if let Some(reply) = &exchange.reply {
                messages.push(json!({"role": "assistant", "content": reply}));
            }
        }
        messages.push(json!({"role": "user", "content": latest}));
        messages
    }
}

#[async_trait]
impl ReplyGenerator for ChatApiGenerator {
    async fn generate(&self, history: &[Exchange], latest: &str) -> Result<String, TurnError> {
        let body = json!({
            "model": self.model,
            "messages": self.messages(history, latest),
            "temperature": 0.7,
        });

        let mut request = self.http.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TurnError::GenerationTimeout(self.timeout)
            } else {
                TurnError::GenerationRejected(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TurnError::GenerationRejected(format!(
                "endpoint returned {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| TurnError::GenerationRejected(format!("unreadable response: {e}")))?;

        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| TurnError::GenerationRejected("response carried no content".to_string()))?
            .trim()
            .to_string();

        debug!("Generated reply ({} chars)", text.len());

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplyConfig;

    #[tokio::test]
    async fn history_is_interleaved_in_order() {
        let generator = ChatApiGenerator::new(&ReplyConfig::default()).unwrap();
        let history = vec![
            Exchange {
                caller: "hello".to_string(),
                reply: Some("hi there".to_string()),
            },
            Exchange {
                caller: "it broke".to_string(),
                reply: None,
            },
        ];

        let messages = generator.messages(&history, "still broken");

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "hello");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "it broke");
        assert_eq!(messages[4]["content"], "still broken");
    }
}
