use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lib_inbox::{catalog_import::import_csv, InventoryItem, NewItem};
use rust_decimal::Decimal;

use super::{
    BrandProfile, DraftRecord, DraftSummary, FilterDecision, ItemUpdate, Store, ToneProfile,
};
use crate::server_config::AccountConfig;

#[derive(Default)]
struct Tables {
    inventory: Vec<InventoryItem>,
    tones: HashMap<String, ToneProfile>,
    brands: HashMap<String, BrandProfile>,
    created_at: HashMap<String, DateTime<Utc>>,
    filtered: HashMap<(String, String), FilterDecision>,
    drafts: Vec<DraftRecord>,
    duplicate_thresholds: HashMap<String, f64>,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds brand, account dates and catalogs from the configured accounts.
    pub fn from_accounts(accounts: &[AccountConfig]) -> anyhow::Result<Self> {
        let store = Self::new();
        for account in accounts {
            store.set_brand(
                &account.user_id,
                BrandProfile {
                    brand_summary: account.brand_summary.clone(),
                    signature: account.signature.clone(),
                    special_instructions: account.special_instructions.clone(),
                },
            );
            if let Some(created_at) = account.created_at {
                store.set_created_at(&account.user_id, created_at);
            }
            if let Some(path) = &account.catalog_csv {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Could not read catalog {}", path))?;
                let items = import_csv(&bytes)
                    .with_context(|| format!("Could not import catalog {}", path))?;
                tracing::info!(
                    "Seeded {} catalog items for {}",
                    items.len(),
                    account.user_id
                );
                store.add_items(&account.user_id, &items);
            }
        }
        Ok(store)
    }

    pub fn set_tone(&self, user_id: &str, tone: ToneProfile) {
        self.write().tones.insert(user_id.to_string(), tone);
    }

    pub fn set_brand(&self, user_id: &str, brand: BrandProfile) {
        self.write().brands.insert(user_id.to_string(), brand);
    }

    pub fn set_created_at(&self, user_id: &str, created_at: DateTime<Utc>) {
        self.write()
            .created_at
            .insert(user_id.to_string(), created_at);
    }

    pub fn add_items(&self, user_id: &str, items: &[NewItem]) -> usize {
        let mut tables = self.write();
        for item in items {
            tables.inventory.push(self.stored_item(user_id, item));
        }
        items.len()
    }

    fn stored_item(&self, user_id: &str, item: &NewItem) -> InventoryItem {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut record = InventoryItem::new(user_id, item.name.clone(), item.price);
        record.id = Some(id.to_string());
        record
    }

    pub fn filtered(&self, user_id: &str) -> Vec<FilterDecision> {
        self.read()
            .filtered
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn drafts(&self, user_id: &str) -> Vec<DraftRecord> {
        self.read()
            .drafts
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_inventory(&self, user_id: &str) -> anyhow::Result<Vec<InventoryItem>> {
        Ok(self
            .read()
            .inventory
            .iter()
            .filter(|item| item.owner == user_id)
            .cloned()
            .collect())
    }

    async fn fetch_tone(&self, user_id: &str) -> anyhow::Result<Option<ToneProfile>> {
        Ok(self.read().tones.get(user_id).cloned())
    }

    async fn fetch_brand(&self, user_id: &str) -> anyhow::Result<BrandProfile> {
        Ok(self.read().brands.get(user_id).cloned().unwrap_or_default())
    }

    async fn account_created_at(&self, user_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.read().created_at.get(user_id).copied())
    }

    async fn is_seen(&self, user_id: &str, message_id: &str) -> anyhow::Result<bool> {
        let tables = self.read();
        let key = (user_id.to_string(), message_id.to_string());
        Ok(tables.filtered.contains_key(&key)
            || tables
                .drafts
                .iter()
                .any(|d| d.user_id == user_id && d.message_id == message_id))
    }

    async fn record_filtered(&self, decision: FilterDecision) -> anyhow::Result<()> {
        let key = (decision.user_id.clone(), decision.message_id.clone());
        self.write().filtered.insert(key, decision);
        Ok(())
    }

    async fn record_draft(&self, draft: DraftRecord) -> anyhow::Result<()> {
        self.write().drafts.push(draft);
        Ok(())
    }

    async fn insert_items(&self, user_id: &str, items: &[NewItem]) -> anyhow::Result<usize> {
        Ok(self.add_items(user_id, items))
    }

    async fn update_price(&self, item_id: &str, price: Decimal) -> anyhow::Result<bool> {
        let mut tables = self.write();
        match tables
            .inventory
            .iter_mut()
            .find(|item| item.id.as_deref() == Some(item_id))
        {
            Some(item) => {
                item.price = price;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_item(&self, user_id: &str, item: &NewItem) -> anyhow::Result<InventoryItem> {
        let record = self.stored_item(user_id, item);
        self.write().inventory.push(record.clone());
        Ok(record)
    }

    async fn update_item(
        &self,
        user_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> anyhow::Result<Option<InventoryItem>> {
        let mut tables = self.write();
        let Some(item) = tables
            .inventory
            .iter_mut()
            .find(|item| item.owner == user_id && item.id.as_deref() == Some(item_id))
        else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            item.name = name.clone();
        }
        if let Some(price) = update.price {
            item.price = price;
        }
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, user_id: &str, item_id: &str) -> anyhow::Result<bool> {
        let mut tables = self.write();
        let before = tables.inventory.len();
        tables
            .inventory
            .retain(|item| !(item.owner == user_id && item.id.as_deref() == Some(item_id)));
        Ok(tables.inventory.len() < before)
    }

    async fn recent_drafts(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<DraftSummary>> {
        let tables = self.read();
        let mut drafts: Vec<&DraftRecord> = tables
            .drafts
            .iter()
            .rev()
            .filter(|d| d.user_id == user_id)
            .collect();
        drafts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(drafts.into_iter().take(limit).map(DraftSummary::from).collect())
    }

    async fn recent_filtered(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<FilterDecision>> {
        let mut filtered = self.filtered(user_id);
        filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        filtered.truncate(limit);
        Ok(filtered)
    }

    async fn duplicate_threshold(&self, user_id: &str) -> anyhow::Result<Option<f64>> {
        Ok(self.read().duplicate_thresholds.get(user_id).copied())
    }

    async fn set_duplicate_threshold(&self, user_id: &str, threshold: f64) -> anyhow::Result<bool> {
        self.write()
            .duplicate_thresholds
            .insert(user_id.to_string(), threshold);
        Ok(true)
    }
}
