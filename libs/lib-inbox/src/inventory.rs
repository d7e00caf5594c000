use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ItemError, PriceError},
    normalize::catalog_key,
    similarity::{jaccard, sequence_ratio, token_set},
};

lazy_static! {
    static ref RE_PRICE_NOISE: Regex = Regex::new(r"[$€£¥₹,\s]").unwrap();
    static ref RE_PRICE_NUMBER: Regex = Regex::new(r"(\d+\.?\d*)").unwrap();
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref RE_EDGE_SYMBOLS: Regex = Regex::new(r"^[^\w\s]+|[^\w\s]+$").unwrap();
    static ref MAX_PRICE: Decimal = Decimal::from(1_000_000);
}

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 200;

/// A catalog entry owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "user_id", default)]
    pub owner: String,
    pub name: String,
    pub price: Decimal,
}

impl InventoryItem {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: None,
            owner: owner.into(),
            name: name.into(),
            price,
        }
    }
}

/// Pulls the first number out of a loosely formatted price ("$1,250.00", "15 USD").
pub fn parse_price(raw: &str) -> Result<Decimal, PriceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PriceError::Empty);
    }

    let stripped = RE_PRICE_NOISE.replace_all(raw, "");
    let number = RE_PRICE_NUMBER
        .captures(&stripped)
        .map(|caps| caps[1].trim_end_matches('.').to_string())
        .ok_or_else(|| PriceError::InvalidFormat(raw.to_string()))?;

    Decimal::from_str(&number).map_err(|_| PriceError::InvalidFormat(raw.to_string()))
}

/// A validated item ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    pub name: String,
    pub price: Decimal,
    /// Source row (1-based, header included) when the item came from a file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl NewItem {
    pub fn validate(name: &str, price: Decimal) -> Result<Self, ItemError> {
        Ok(Self {
            name: clean_name(name)?,
            price: clean_price(price)?,
            row: None,
        })
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

pub fn clean_name(name: &str) -> Result<String, ItemError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ItemError::MissingName);
    }

    let collapsed = RE_WHITESPACE.replace_all(name, " ");
    let cleaned = RE_EDGE_SYMBOLS.replace_all(&collapsed, "").trim().to_string();

    match cleaned.chars().count() {
        n if n < MIN_NAME_CHARS => Err(ItemError::NameTooShort),
        n if n > MAX_NAME_CHARS => Err(ItemError::NameTooLong),
        _ => Ok(cleaned),
    }
}

pub fn clean_price(price: Decimal) -> Result<Decimal, ItemError> {
    if price <= Decimal::ZERO {
        return Err(ItemError::NonPositivePrice);
    }
    if price > *MAX_PRICE {
        return Err(ItemError::PriceTooHigh);
    }
    Ok(price.round_dp(2))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DuplicateAction {
    /// Same product, new price
    Update,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub new_item: NewItem,
    pub existing_item: InventoryItem,
    pub similarity: f64,
    pub action: DuplicateAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub new_items: Vec<NewItem>,
    pub duplicates: Vec<DuplicateMatch>,
}

impl DuplicateReport {
    pub fn updates(&self) -> impl Iterator<Item = &DuplicateMatch> {
        self.duplicates
            .iter()
            .filter(|d| d.action == DuplicateAction::Update)
    }

    pub fn skipped(&self) -> usize {
        self.duplicates
            .iter()
            .filter(|d| d.action == DuplicateAction::Skip)
            .count()
    }
}

/// Name similarity used only for catalog de-duplication.
pub fn duplicate_similarity(a: &str, b: &str) -> f64 {
    let a = catalog_key(a);
    let b = catalog_key(b);

    let sequence = sequence_ratio(&a, &b);
    let words = jaccard(&token_set(&a), &token_set(&b));
    let chars = sequence_ratio(&a.replace(' ', ""), &b.replace(' ', ""));

    sequence.max(words).max(chars)
}

#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    threshold: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(crate::config::DUPLICATE_THRESHOLD)
    }
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Splits `incoming` into genuinely new items and likely duplicates of `existing`.
    pub fn find_duplicates(&self, incoming: Vec<NewItem>, existing: &[InventoryItem]) -> DuplicateReport {
        let mut report = DuplicateReport::default();

        for new_item in incoming {
            let mut best: Option<(&InventoryItem, f64)> = None;
            for item in existing {
                let similarity = duplicate_similarity(&new_item.name, &item.name);
                if similarity > best.map_or(0.0, |(_, s)| s) {
                    best = Some((item, similarity));
                }
            }

            match best {
                Some((item, similarity)) if similarity >= self.threshold => {
                    let action = if new_item.price != item.price {
                        DuplicateAction::Update
                    } else {
                        DuplicateAction::Skip
                    };
                    report.duplicates.push(DuplicateMatch {
                        new_item,
                        existing_item: item.clone(),
                        similarity,
                        action,
                    });
                }
                _ => report.new_items.push(new_item),
            }
        }

        report
    }
}
