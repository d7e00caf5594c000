pub mod draft;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiClient;

pub type DynLanguageModel = Arc<dyn LanguageModel>;

/// Text completion service used to write reply drafts.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: PromptUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ChatApiError {
    pub fn is_rate_limit(&self) -> bool {
        self.code.as_deref() == Some("rate_limit_exceeded")
            || self.message.to_lowercase().contains("rate limit")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatApiErrorBody {
    error: ChatApiError,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiErrorBody),
}
