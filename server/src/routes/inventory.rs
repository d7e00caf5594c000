use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use lib_inbox::{
    catalog_import::import_csv,
    error::{ItemError, PriceError},
    inventory::{clean_name, clean_price, parse_price, DuplicateMatch},
    DuplicateDetector, InventoryItem, MatchedItem, NewItem, Pipeline, ProductRequest,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppJsonResult, AppResult},
    server_config::cfg,
    store::{DynStore, ItemUpdate, Store},
};

const MIN_DUPLICATE_THRESHOLD: f64 = 0.1;
const MAX_DUPLICATE_THRESHOLD: f64 = 1.0;

/// A price sent either as a JSON number or as text such as "$1,250.00".
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl PriceInput {
    fn to_decimal(&self) -> Result<Decimal, ItemError> {
        match self {
            PriceInput::Number(n) => Decimal::try_from(*n)
                .map_err(|_| PriceError::InvalidFormat(n.to_string()).into()),
            PriceInput::Text(raw) => Ok(parse_price(raw)?),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct InventoryResponse {
    pub inventory: Vec<InventoryItem>,
}

/// # GET /inventory/:user_id
pub async fn list(
    State(store): State<DynStore>,
    Path(user_id): Path<String>,
) -> AppJsonResult<InventoryResponse> {
    let inventory = store.fetch_inventory(&user_id).await?;
    Ok(Json(InventoryResponse { inventory }))
}

#[derive(Deserialize, Debug)]
pub struct AddItemBody {
    pub name: String,
    pub price: PriceInput,
}

#[derive(Serialize, Debug)]
pub struct ItemResponse {
    pub message: String,
    pub item: InventoryItem,
}

/// # POST /inventory/:user_id
pub async fn add(
    State(store): State<DynStore>,
    Path(user_id): Path<String>,
    Json(AddItemBody { name, price }): Json<AddItemBody>,
) -> AppJsonResult<ItemResponse> {
    let item = NewItem::validate(&name, price.to_decimal()?)?;
    let item = store.insert_item(&user_id, &item).await?;
    tracing::info!("Added '{}' to the catalog of {}", item.name, user_id);

    Ok(Json(ItemResponse {
        message: "Item added successfully".to_string(),
        item,
    }))
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateItemBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<PriceInput>,
}

/// # PUT /inventory/:user_id/items/:item_id
pub async fn update(
    State(store): State<DynStore>,
    Path((user_id, item_id)): Path<(String, String)>,
    Json(body): Json<UpdateItemBody>,
) -> AppJsonResult<ItemResponse> {
    let update = ItemUpdate {
        name: body.name.as_deref().map(clean_name).transpose()?,
        price: body
            .price
            .map(|p| p.to_decimal().and_then(clean_price))
            .transpose()?,
    };
    if update.is_empty() {
        return Err(AppError::BadRequest("No data provided for update".to_string()));
    }

    let item = store
        .update_item(&user_id, &item_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;

    Ok(Json(ItemResponse {
        message: "Item updated".to_string(),
        item,
    }))
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

/// # DELETE /inventory/:user_id/items/:item_id
pub async fn delete(
    State(store): State<DynStore>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> AppJsonResult<MessageResponse> {
    if !store.delete_item(&user_id, &item_id).await? {
        return Err(AppError::NotFound(format!("Item {} not found", item_id)));
    }
    tracing::info!("Deleted item {} from the catalog of {}", item_id, user_id);

    Ok(Json(MessageResponse {
        message: "Item deleted".to_string(),
    }))
}

#[derive(Deserialize, Debug)]
pub struct ThresholdBody {
    pub threshold: f64,
}

#[derive(Serialize, Debug)]
pub struct ThresholdResponse {
    pub message: String,
    pub threshold: f64,
}

/// # POST /inventory/:user_id/duplicate-threshold
///
/// Similarity at or above which an imported item counts as an existing product.
pub async fn set_duplicate_threshold(
    State(store): State<DynStore>,
    Path(user_id): Path<String>,
    Json(ThresholdBody { threshold }): Json<ThresholdBody>,
) -> AppJsonResult<ThresholdResponse> {
    if !(MIN_DUPLICATE_THRESHOLD..=MAX_DUPLICATE_THRESHOLD).contains(&threshold) {
        return Err(AppError::BadRequest(format!(
            "Threshold must be between {} and {}",
            MIN_DUPLICATE_THRESHOLD, MAX_DUPLICATE_THRESHOLD
        )));
    }
    if !store.set_duplicate_threshold(&user_id, threshold).await? {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    Ok(Json(ThresholdResponse {
        message: format!("Duplicate detection threshold set to {}", threshold),
        threshold,
    }))
}

/// # POST /inventory/:user_id/test-matching
///
/// Runs extraction and matching against the user's catalog without touching the mailbox.

#[derive(Deserialize)]
pub struct TestMatchingBody {
    #[serde(default)]
    pub subject: String,
    pub body: String,
}

#[derive(Serialize, Debug)]
pub struct TestMatchingResponse {
    pub extracted_requests: Vec<ProductRequest>,
    pub matches: Vec<MatchedItem>,
    pub context: String,
    pub inventory_size: usize,
}

pub async fn test_matching(
    State(store): State<DynStore>,
    State(pipeline): State<Arc<Pipeline>>,
    Path(user_id): Path<String>,
    Json(TestMatchingBody { subject, body }): Json<TestMatchingBody>,
) -> AppJsonResult<TestMatchingResponse> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Email body is required".to_string()));
    }

    let inventory = store.fetch_inventory(&user_id).await?;
    let lookup = pipeline.inventory_context(&subject, &body, &inventory);

    Ok(Json(TestMatchingResponse {
        extracted_requests: lookup.requests,
        matches: lookup.context.items,
        context: lookup.context.text,
        inventory_size: inventory.len(),
    }))
}

/// # POST /inventory/:user_id/import
///
/// Body is the raw CSV file. Items that look like an existing product update its price instead
/// of being inserted again.

#[derive(Serialize, Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub new_items: usize,
    pub updated_items: usize,
    pub skipped_items: usize,
    pub total_processed: usize,
}

#[derive(Serialize, Debug)]
pub struct ImportResponse {
    pub message: String,
    pub summary: ImportSummary,
    pub duplicates_found: Vec<DuplicateMatch>,
}

pub async fn import(
    State(store): State<DynStore>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> AppJsonResult<ImportResponse> {
    let response = import_catalog(store.as_ref(), &user_id, &body, cfg.scoring.duplicate_threshold)
        .await?;
    Ok(Json(response))
}

/// Imports with the user's own duplicate threshold, or `default_threshold` if none is stored.
pub async fn import_catalog(
    store: &dyn Store,
    user_id: &str,
    data: &[u8],
    default_threshold: f64,
) -> AppResult<ImportResponse> {
    let items = import_csv(data)?;
    let total_processed = items.len();

    let duplicate_threshold = store
        .duplicate_threshold(user_id)
        .await?
        .unwrap_or(default_threshold);
    let existing = store.fetch_inventory(user_id).await?;
    let report = DuplicateDetector::new(duplicate_threshold).find_duplicates(items, &existing);

    let new_items = if report.new_items.is_empty() {
        0
    } else {
        store.insert_items(user_id, &report.new_items).await?
    };

    let mut updated_items = 0;
    for duplicate in report.updates() {
        let Some(item_id) = duplicate.existing_item.id.as_deref() else {
            tracing::warn!(
                "Cannot update '{}' for {}: existing item has no id",
                duplicate.existing_item.name,
                user_id
            );
            continue;
        };
        if store.update_price(item_id, duplicate.new_item.price).await? {
            updated_items += 1;
        }
    }

    let summary = ImportSummary {
        new_items,
        updated_items,
        skipped_items: report.skipped(),
        total_processed,
    };
    tracing::info!("Catalog import for {}: {:?}", user_id, summary);

    Ok(ImportResponse {
        message: format!(
            "Imported {} new items, updated {}, skipped {}",
            summary.new_items, summary.updated_items, summary.skipped_items
        ),
        summary,
        duplicates_found: report.duplicates,
    })
}
