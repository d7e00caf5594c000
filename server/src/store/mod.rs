pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lib_inbox::{FilterReason, InventoryItem, MatchedItem, NewItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

pub type DynStore = Arc<dyn Store>;

const MAX_FIELD_CHARS: usize = 255;

/// A message that was evaluated and suppressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub user_id: String,
    pub message_id: String,
    #[serde(rename = "filter_reason")]
    pub reason: FilterReason,
    pub sender: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

impl FilterDecision {
    pub fn new(
        user_id: &str,
        message_id: &str,
        reason: FilterReason,
        sender: &str,
        subject: &str,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            message_id: message_id.to_string(),
            reason,
            sender: truncate(sender, MAX_FIELD_CHARS),
            subject: truncate(subject, MAX_FIELD_CHARS),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DraftStatus {
    Generated,
    GenerationFailed(String),
}

/// A processed message and the reply generated for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRecord {
    pub user_id: String,
    pub message_id: String,
    pub sender: String,
    pub incoming_subject: String,
    pub incoming_body: String,
    pub original_body: String,
    pub draft: String,
    #[serde(flatten)]
    pub status: DraftStatus,
    pub matched_inventory: Vec<MatchedItem>,
    pub received_at: Option<DateTime<Utc>>,
    pub gmail_draft_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DraftStatus {
    fn parts(&self) -> (&'static str, Option<String>) {
        match self {
            DraftStatus::Generated => ("generated", None),
            DraftStatus::GenerationFailed(e) => ("generation_failed", Some(e.clone())),
        }
    }
}

/// A stored draft as listed back to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSummary {
    pub message_id: String,
    pub sender: String,
    pub incoming_subject: String,
    pub draft: String,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub gmail_draft_id: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&DraftRecord> for DraftSummary {
    fn from(record: &DraftRecord) -> Self {
        let (status, error) = record.status.parts();
        Self {
            message_id: record.message_id.clone(),
            sender: record.sender.clone(),
            incoming_subject: record.incoming_subject.clone(),
            draft: record.draft.clone(),
            status: status.to_string(),
            error,
            gmail_draft_id: record.gmail_draft_id.clone(),
            received_at: record.received_at,
            created_at: record.created_at,
        }
    }
}

/// Partial edit of a catalog entry; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationPatterns {
    pub avg_sentence_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolitenessAnalysis {
    pub communication_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionalTone {
    pub dominant_emotion: String,
}

/// Writing-style statistics for a user, produced elsewhere and read as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneProfile {
    pub communication_patterns: CommunicationPatterns,
    /// (word, count) pairs, most frequent first
    pub top_words: Vec<(String, u32)>,
    pub politeness_analysis: PolitenessAnalysis,
    pub emotional_tone: EmotionalTone,
}

impl ToneProfile {
    pub fn top_words(&self, n: usize) -> Vec<&str> {
        self.top_words.iter().take(n).map(|(w, _)| w.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandProfile {
    pub brand_summary: String,
    /// HTML signature appended to every draft
    pub signature: String,
    pub special_instructions: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_inventory(&self, user_id: &str) -> anyhow::Result<Vec<InventoryItem>>;

    async fn fetch_tone(&self, user_id: &str) -> anyhow::Result<Option<ToneProfile>>;

    async fn fetch_brand(&self, user_id: &str) -> anyhow::Result<BrandProfile>;

    async fn account_created_at(&self, user_id: &str) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// True when the message already has a draft or a filter decision.
    async fn is_seen(&self, user_id: &str, message_id: &str) -> anyhow::Result<bool>;

    /// Upsert keyed on (user_id, message_id).
    async fn record_filtered(&self, decision: FilterDecision) -> anyhow::Result<()>;

    async fn record_draft(&self, draft: DraftRecord) -> anyhow::Result<()>;

    async fn insert_items(&self, user_id: &str, items: &[NewItem]) -> anyhow::Result<usize>;

    async fn update_price(&self, item_id: &str, price: Decimal) -> anyhow::Result<bool>;

    async fn insert_item(&self, user_id: &str, item: &NewItem) -> anyhow::Result<InventoryItem>;

    /// `None` when the user owns no item with this id.
    async fn update_item(
        &self,
        user_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> anyhow::Result<Option<InventoryItem>>;

    async fn delete_item(&self, user_id: &str, item_id: &str) -> anyhow::Result<bool>;

    /// Newest first.
    async fn recent_drafts(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<DraftSummary>>;

    /// Newest first.
    async fn recent_filtered(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<FilterDecision>>;

    async fn duplicate_threshold(&self, user_id: &str) -> anyhow::Result<Option<f64>>;

    /// Returns `false` when the user is unknown to the store.
    async fn set_duplicate_threshold(&self, user_id: &str, threshold: f64) -> anyhow::Result<bool>;
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
