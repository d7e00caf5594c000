use std::env;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lib_inbox::{InventoryItem, NewItem};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{
    BrandProfile, DraftRecord, DraftSummary, FilterDecision, ItemUpdate, Store, ToneProfile,
};
use crate::HttpClient;

const RETURN_ROWS: &str = "return=representation";
const DRAFT_COLUMNS: &str =
    "message_id,sender,incoming_subject,draft,status,error,gmail_draft_id,received_at,created_at";
const FILTERED_COLUMNS: &str = "user_id,message_id,filter_reason,sender,subject,created_at";

/// PostgREST-backed store for a hosted Supabase project.
pub struct SupabaseStore {
    http_client: HttpClient,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ToneRow {
    tone_data: Value,
}

#[derive(Debug, Deserialize)]
struct ThresholdRow {
    #[serde(default)]
    duplicate_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    brand_summary: Option<String>,
    #[serde(default)]
    special_instructions: Option<String>,
}

impl SupabaseStore {
    pub fn new(url: &str, key: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).context("Invalid characters in Supabase key")?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {key}"))
                .context("Invalid characters in Supabase key")?,
        );

        let http_client = reqwest::ClientBuilder::new()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let url = env::var("SUPABASE_URL").context("SUPABASE_URL is required")?;
        let key = env::var("SUPABASE_KEY").context("SUPABASE_KEY is required")?;
        Self::new(&url, &key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filters: &[(&str, String)],
    ) -> anyhow::Result<Vec<T>> {
        let mut query = vec![("select", columns.to_string())];
        query.extend(filters.iter().cloned());

        let resp = self
            .http_client
            .get(self.table_url(table))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Could not query {}", table))?;

        let status = resp.status();
        let data = resp.json::<Value>().await?;
        if !status.is_success() {
            return Err(anyhow!("Error querying {} ({}): {}", table, status, data));
        }

        serde_json::from_value(data).with_context(|| format!("Unexpected {} rows", table))
    }

    async fn write(
        &self,
        request: reqwest::RequestBuilder,
        table: &str,
        body: Option<&Value>,
        prefer: &str,
    ) -> anyhow::Result<Vec<Value>> {
        let mut request = request.header("Prefer", prefer);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("Could not write to {}", table))?;

        let status = resp.status();
        let data = resp.json::<Value>().await?;
        if !status.is_success() {
            return Err(anyhow!("Error writing to {} ({}): {}", table, status, data));
        }

        parse_rows(data).with_context(|| format!("Unexpected response writing to {}", table))
    }

    async fn user_row(&self, user_id: &str) -> anyhow::Result<Option<UserRow>> {
        let rows = self
            .select::<UserRow>(
                "users",
                "created_at,signature,brand_summary,special_instructions",
                &[("id", eq(user_id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn exists(&self, table: &str, user_id: &str, message_id: &str) -> anyhow::Result<bool> {
        let rows = self
            .select::<Value>(
                table,
                "message_id",
                &[
                    ("user_id", eq(user_id)),
                    ("message_id", eq(message_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

/// Writes ask for `return=representation`, so a successful response is an array of rows.
fn parse_rows(data: Value) -> anyhow::Result<Vec<Value>> {
    match data {
        Value::Array(rows) => Ok(rows),
        other => Err(anyhow!("Expected an array of rows, got {}", other)),
    }
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> anyhow::Result<Option<T>> {
    rows.into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .context("Unexpected row shape")
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// `tone_data` is stored either as a JSON object or as a JSON-encoded string.
fn parse_tone(tone_data: Value) -> anyhow::Result<ToneProfile> {
    let tone = match tone_data {
        Value::String(raw) => serde_json::from_str(&raw)?,
        other => serde_json::from_value(other)?,
    };
    Ok(tone)
}

#[async_trait]
impl Store for SupabaseStore {
    async fn fetch_inventory(&self, user_id: &str) -> anyhow::Result<Vec<InventoryItem>> {
        let items = self
            .select::<InventoryItem>("inventory", "id,user_id,name,price", &[("user_id", eq(user_id))])
            .await?;
        Ok(items)
    }

    async fn fetch_tone(&self, user_id: &str) -> anyhow::Result<Option<ToneProfile>> {
        let rows = self
            .select::<ToneRow>("tone_profiles", "tone_data", &[("user_id", eq(user_id))])
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(parse_tone(row.tone_data).context("Invalid tone profile")?)),
            None => Ok(None),
        }
    }

    async fn fetch_brand(&self, user_id: &str) -> anyhow::Result<BrandProfile> {
        let brand = self
            .user_row(user_id)
            .await?
            .map(|row| BrandProfile {
                brand_summary: row.brand_summary.unwrap_or_default(),
                signature: row.signature.unwrap_or_default(),
                special_instructions: row.special_instructions.unwrap_or_default(),
            })
            .unwrap_or_default();
        Ok(brand)
    }

    async fn account_created_at(&self, user_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.user_row(user_id).await?.and_then(|row| row.created_at))
    }

    async fn is_seen(&self, user_id: &str, message_id: &str) -> anyhow::Result<bool> {
        if self.exists("drafts", user_id, message_id).await? {
            return Ok(true);
        }
        self.exists("filtered_emails", user_id, message_id).await
    }

    async fn record_filtered(&self, decision: FilterDecision) -> anyhow::Result<()> {
        let request = self
            .http_client
            .post(self.table_url("filtered_emails"))
            .query(&[("on_conflict", "user_id,message_id")]);
        self.write(
            request,
            "filtered_emails",
            Some(&serde_json::to_value(&decision)?),
            "resolution=merge-duplicates,return=representation",
        )
        .await?;
        Ok(())
    }

    async fn record_draft(&self, draft: DraftRecord) -> anyhow::Result<()> {
        let request = self.http_client.post(self.table_url("drafts"));
        self.write(request, "drafts", Some(&serde_json::to_value(&draft)?), RETURN_ROWS)
            .await?;
        Ok(())
    }

    async fn insert_items(&self, user_id: &str, items: &[NewItem]) -> anyhow::Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = items
            .iter()
            .map(|item| json!({"user_id": user_id, "name": item.name, "price": item.price}))
            .collect();

        let request = self.http_client.post(self.table_url("inventory"));
        let inserted = self
            .write(request, "inventory", Some(&Value::Array(rows)), RETURN_ROWS)
            .await?;
        Ok(inserted.len())
    }

    async fn update_price(&self, item_id: &str, price: Decimal) -> anyhow::Result<bool> {
        let request = self
            .http_client
            .patch(self.table_url("inventory"))
            .query(&[("id", eq(item_id))]);
        let updated = self
            .write(request, "inventory", Some(&json!({"price": price})), RETURN_ROWS)
            .await?;
        Ok(!updated.is_empty())
    }

    async fn insert_item(&self, user_id: &str, item: &NewItem) -> anyhow::Result<InventoryItem> {
        let request = self.http_client.post(self.table_url("inventory"));
        let body = json!({"user_id": user_id, "name": item.name, "price": item.price});
        let rows = self
            .write(request, "inventory", Some(&body), RETURN_ROWS)
            .await?;
        first_row(rows)?.ok_or_else(|| anyhow!("Failed to add inventory item"))
    }

    async fn update_item(
        &self,
        user_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> anyhow::Result<Option<InventoryItem>> {
        let request = self
            .http_client
            .patch(self.table_url("inventory"))
            .query(&[("id", eq(item_id)), ("user_id", eq(user_id))]);
        let rows = self
            .write(request, "inventory", Some(&serde_json::to_value(update)?), RETURN_ROWS)
            .await?;
        first_row(rows)
    }

    async fn delete_item(&self, user_id: &str, item_id: &str) -> anyhow::Result<bool> {
        let request = self
            .http_client
            .delete(self.table_url("inventory"))
            .query(&[("id", eq(item_id)), ("user_id", eq(user_id))]);
        let deleted = self.write(request, "inventory", None, RETURN_ROWS).await?;
        Ok(!deleted.is_empty())
    }

    async fn recent_drafts(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<DraftSummary>> {
        self.select(
            "drafts",
            DRAFT_COLUMNS,
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn recent_filtered(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<FilterDecision>> {
        self.select(
            "filtered_emails",
            FILTERED_COLUMNS,
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn duplicate_threshold(&self, user_id: &str) -> anyhow::Result<Option<f64>> {
        let rows = self
            .select::<ThresholdRow>("users", "duplicate_threshold", &[("id", eq(user_id))])
            .await?;
        Ok(rows.into_iter().next().and_then(|row| row.duplicate_threshold))
    }

    async fn set_duplicate_threshold(&self, user_id: &str, threshold: f64) -> anyhow::Result<bool> {
        let request = self
            .http_client
            .patch(self.table_url("users"))
            .query(&[("id", eq(user_id))]);
        let updated = self
            .write(
                request,
                "users",
                Some(&json!({"duplicate_threshold": threshold})),
                RETURN_ROWS,
            )
            .await?;
        Ok(!updated.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_slash() {
        let store = SupabaseStore::new("https://abc.supabase.co/", "key").unwrap();
        assert_eq!(
            store.table_url("inventory"),
            "https://abc.supabase.co/rest/v1/inventory"
        );
    }

    #[test]
    fn test_parse_tone_from_string_or_object() {
        let raw = r#"{"emotional_tone": {"dominant_emotion": "excitement"}}"#;
        let from_string = parse_tone(Value::String(raw.to_string())).unwrap();
        let from_object = parse_tone(serde_json::from_str(raw).unwrap()).unwrap();
        assert_eq!(from_string, from_object);
        assert_eq!(from_object.emotional_tone.dominant_emotion, "excitement");
    }

    #[test]
    fn test_write_response_must_be_rows() {
        let rows = parse_rows(json!([{"id": "1"}, {"id": "2"}])).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(parse_rows(json!([])).unwrap().is_empty());

        let err = parse_rows(json!({"message": "ok"})).unwrap_err();
        assert!(err.to_string().starts_with("Expected an array of rows"));
        assert!(parse_rows(Value::Null).is_err());
    }

    #[test]
    fn test_first_row_parses_returned_item() {
        let item: Option<InventoryItem> = first_row(vec![
            json!({"id": "9", "user_id": "u1", "name": "Dance Floor", "price": 250.0}),
        ])
        .unwrap();
        assert_eq!(item.unwrap().name, "Dance Floor");
        assert_eq!(first_row::<InventoryItem>(vec![]).unwrap(), None);
        assert!(first_row::<InventoryItem>(vec![json!({"id": 1})]).is_err());
    }

    #[test]
    fn test_inventory_rows_deserialize() {
        let rows: Vec<InventoryItem> = serde_json::from_value(json!([
            {"id": "7", "user_id": "u1", "name": "Round Table", "price": 15.0}
        ]))
        .unwrap();
        assert_eq!(rows[0].owner, "u1");
        assert_eq!(rows[0].price, Decimal::from(15));
    }
}
