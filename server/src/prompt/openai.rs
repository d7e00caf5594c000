use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::json;

use super::{ChatApiResponseOrError, LanguageModel};
use crate::{
    rate_limiters::RateLimiters,
    server_config::{cfg, ModelConfig},
    HttpClient,
};

const AI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiClient {
    http_client: HttpClient,
    rate_limiters: RateLimiters,
    api_key: String,
    model: ModelConfig,
}

impl OpenAiClient {
    pub fn new(
        http_client: HttpClient,
        rate_limiters: RateLimiters,
        api_key: String,
        model: ModelConfig,
    ) -> Self {
        Self {
            http_client,
            rate_limiters,
            api_key,
            model,
        }
    }

    pub fn from_config(http_client: HttpClient, rate_limiters: RateLimiters) -> Self {
        Self::new(
            http_client,
            rate_limiters,
            cfg.api.key.clone(),
            cfg.model.clone(),
        )
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.rate_limiters.acquire_one().await;

        let resp = self
            .http_client
            .post(AI_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!(
              {
                "model": &self.model.id,
                "temperature": self.model.temperature,
                "max_tokens": self.model.max_tokens,
                "messages": [
                  {
                    "role": "user",
                    "content": prompt
                  }
                ]
              }
            ))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await
            .context("Could not read chat response")?;

        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
            .context(format!("Could not parse chat response: {}", resp))?;

        let parsed = match parsed {
            ChatApiResponseOrError::Error(body) => {
                if body.error.is_rate_limit() {
                    self.rate_limiters.trigger_backoff();
                    tracing::warn!("Chat API rate limited, {}", self.rate_limiters.get_status());
                }
                return Err(anyhow!("Chat API error: {:?}", body.error));
            }
            ChatApiResponseOrError::Response(parsed) => parsed,
        };

        let choice = parsed.choices.first().context("No choices in response")?;
        tracing::debug!("Draft used {} tokens", parsed.usage.total_tokens);

        let content = choice.message.content.trim();
        if content.is_empty() {
            return Err(anyhow!("Empty completion"));
        }
        Ok(content.to_string())
    }
}
