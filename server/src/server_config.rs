use std::{env, path::Path};

use chrono::{DateTime, Utc};
use config::{Config, ConfigError};
use lazy_static::lazy_static;
use lib_inbox::ScoringConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub max_consecutive_failures: u32,
    pub list_max_results: u32,
    /// How long shutdown waits for in-flight messages
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptLimits {
    pub rate_limit_per_sec: usize,
    pub refill_interval_ms: usize,
    pub refill_amount: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiSection {
    prompt_limits: PromptLimits,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub key: String,
    pub prompt_limits: PromptLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Supabase,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
}

/// A mailbox the server may monitor.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub user_id: String,
    pub email_address: String,
    /// Name of the env var holding the Gmail access token
    pub token_env: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub monitor_on_startup: bool,
    #[serde(default)]
    pub catalog_csv: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub brand_summary: String,
    #[serde(default)]
    pub special_instructions: String,
}

impl AccountConfig {
    pub fn access_token(&self) -> Option<String> {
        env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    model: ModelConfig,
    api: ApiSection,
    #[serde(default)]
    scoring: ScoringConfig,
    store: StoreConfig,
    #[serde(default)]
    accounts: Vec<AccountConfig>,
}

impl ConfigFile {
    fn from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub model: ModelConfig,
    pub api: ApiConfig,
    pub scoring: ScoringConfig,
    pub store: StoreConfig,
    pub accounts: Vec<AccountConfig>,
}

impl ServerConfig {
    pub fn account(&self, user_id: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.user_id == user_id)
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nModel: {:?}\n\nPrompt limits: {:?}\n\nScoring: {:?}\n\nStore: {}\n\nAccounts:\n{}",
            self.settings,
            self.model,
            self.api.prompt_limits,
            self.scoring,
            self.store.kind,
            self.accounts
                .iter()
                .map(|a| format!("{} -> {}", a.user_id, a.email_address))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

pub fn config_dir() -> String {
    env::var("APP_DIR").unwrap_or_else(|_| {
        let dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
        let parent = Path::new(&dir)
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or(dir);
        format!("{}/config", parent)
    })
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let path = format!("{}/config.toml", config_dir());
        let ConfigFile {
            settings,
            model,
            api,
            scoring,
            store,
            accounts,
        } = ConfigFile::from_file(&path).expect("config.toml is required");

        ServerConfig {
            settings,
            model,
            api: ApiConfig {
                key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                prompt_limits: api.prompt_limits,
            },
            scoring,
            store,
            accounts,
        }
    };
}
