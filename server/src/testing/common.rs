use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering::Relaxed},
        Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lib_inbox::{IncomingMessage, InventoryItem, NewItem};
use rust_decimal::Decimal;

use crate::{
    email::{DraftReply, Mailbox},
    prompt::LanguageModel,
    store::{
        BrandProfile, DraftRecord, DraftSummary, FilterDecision, ItemUpdate, MemoryStore, Store,
        ToneProfile,
    },
};

/// Passes screening as a new customer asking about stocked items.
pub const CUSTOMER_BODY: &str = "Hi, I'd like to order 5 chairs for my event next week. \
    What would the price be for delivery?";

/// A message as the mailbox would return it, in thread `thread-{id}`.
pub fn incoming(id: &str, sender: &str, subject: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        id: id.to_string(),
        thread_id: format!("thread-{id}"),
        sender: sender.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        headers: vec![],
        message_id_header: Some(format!("{id}@mail.example.org")),
        received_at: Some(Utc::now()),
    }
}

/// In-memory mailbox that counts how often it is asked for each thing.
#[derive(Default)]
pub struct FakeMailbox {
    messages: Mutex<Vec<IncomingMessage>>,
    unreadable: Mutex<HashSet<String>>,
    drafts: Mutex<Vec<DraftReply>>,
    fail_listing: AtomicBool,
    fail_drafts: AtomicBool,
    list_calls: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeMailbox {
    pub fn push(&self, message: IncomingMessage) {
        self.messages.lock().unwrap().push(message);
    }

    /// Listed, but every fetch fails.
    pub fn push_unreadable(&self, id: &str) {
        self.unreadable.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Relaxed);
    }

    pub fn fail_drafts(&self) {
        self.fail_drafts.store(true, Relaxed);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Relaxed)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Relaxed)
    }

    pub fn drafts(&self) -> Vec<DraftReply> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn list_message_ids(&self, _after: Option<NaiveDate>) -> anyhow::Result<Vec<String>> {
        self.list_calls.fetch_add(1, Relaxed);
        if self.fail_listing.load(Relaxed) {
            return Err(anyhow!("Mailbox unavailable"));
        }
        let mut ids: Vec<String> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.id.clone())
            .collect();
        ids.extend(self.unreadable.lock().unwrap().iter().cloned());
        Ok(ids)
    }

    async fn get_message(&self, message_id: &str) -> anyhow::Result<IncomingMessage> {
        self.fetches.fetch_add(1, Relaxed);
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| anyhow!("Message {} not found", message_id))
    }

    async fn create_draft(&self, reply: &DraftReply) -> anyhow::Result<String> {
        if self.fail_drafts.load(Relaxed) {
            return Err(anyhow!("Draft quota exceeded"));
        }
        self.drafts.lock().unwrap().push(reply.clone());
        Ok(format!("draft-{}", reply.thread_id))
    }
}

/// Language model with a canned reply, or one that always fails.
pub struct FakeLanguageModel {
    reply: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLanguageModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            prompts: Mutex::new(vec![]),
        }
    }

    /// Every completion takes `delay` before answering.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("The model is overloaded"))
    }
}

/// A `MemoryStore` whose draft writes always fail.
#[derive(Default)]
pub struct DraftRejectingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl Store for DraftRejectingStore {
    async fn fetch_inventory(&self, user_id: &str) -> anyhow::Result<Vec<InventoryItem>> {
        self.inner.fetch_inventory(user_id).await
    }

    async fn fetch_tone(&self, user_id: &str) -> anyhow::Result<Option<ToneProfile>> {
        self.inner.fetch_tone(user_id).await
    }

    async fn fetch_brand(&self, user_id: &str) -> anyhow::Result<BrandProfile> {
        self.inner.fetch_brand(user_id).await
    }

    async fn account_created_at(&self, user_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.inner.account_created_at(user_id).await
    }

    async fn is_seen(&self, user_id: &str, message_id: &str) -> anyhow::Result<bool> {
        self.inner.is_seen(user_id, message_id).await
    }

    async fn record_filtered(&self, decision: FilterDecision) -> anyhow::Result<()> {
        self.inner.record_filtered(decision).await
    }

    async fn record_draft(&self, _draft: DraftRecord) -> anyhow::Result<()> {
        Err(anyhow!("drafts table unavailable"))
    }

    async fn insert_items(&self, user_id: &str, items: &[NewItem]) -> anyhow::Result<usize> {
        self.inner.insert_items(user_id, items).await
    }

    async fn update_price(&self, item_id: &str, price: Decimal) -> anyhow::Result<bool> {
        self.inner.update_price(item_id, price).await
    }

    async fn insert_item(&self, user_id: &str, item: &NewItem) -> anyhow::Result<InventoryItem> {
        self.inner.insert_item(user_id, item).await
    }

    async fn update_item(
        &self,
        user_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> anyhow::Result<Option<InventoryItem>> {
        self.inner.update_item(user_id, item_id, update).await
    }

    async fn delete_item(&self, user_id: &str, item_id: &str) -> anyhow::Result<bool> {
        self.inner.delete_item(user_id, item_id).await
    }

    async fn recent_drafts(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<DraftSummary>> {
        self.inner.recent_drafts(user_id, limit).await
    }

    async fn recent_filtered(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<FilterDecision>> {
        self.inner.recent_filtered(user_id, limit).await
    }

    async fn duplicate_threshold(&self, user_id: &str) -> anyhow::Result<Option<f64>> {
        self.inner.duplicate_threshold(user_id).await
    }

    async fn set_duplicate_threshold(&self, user_id: &str, threshold: f64) -> anyhow::Result<bool> {
        self.inner.set_duplicate_threshold(user_id, threshold).await
    }
}
