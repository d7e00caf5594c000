use std::fmt::Write;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::matcher::MatchRecord;

pub const INVENTORY_HEADER: &str = "\n\n--- RELEVANT INVENTORY ---\n";
pub const INVENTORY_TRAILER: &str = "\nIMPORTANT: When customer asks generically or uses different spellings, \
show them the available options. Be helpful and ask what they prefer if multiple options exist.";
pub const NO_MATCH_CONTEXT: &str = "\n\n--- INVENTORY STATUS ---\n\
No matching products found in current inventory for this request.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedItem {
    pub name: String,
    pub price: Decimal,
    pub similarity: f64,
    pub request_text: String,
    pub request_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// Text block for the prompt plus the items it mentions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryContext {
    pub text: String,
    pub items: Vec<MatchedItem>,
}

impl InventoryContext {
    pub fn has_matches(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Groups matches by request text, drops repeated (name, price) pairs and renders the block.
pub fn build_context(matches: &[MatchRecord]) -> InventoryContext {
    if matches.is_empty() {
        return InventoryContext {
            text: NO_MATCH_CONTEXT.to_string(),
            items: vec![],
        };
    }

    let mut groups: IndexMap<&str, Vec<MatchRecord>> = IndexMap::new();
    for m in matches {
        groups.entry(m.request.text.as_str()).or_default().push(*m);
    }

    let mut text = INVENTORY_HEADER.to_string();
    let mut items = vec![];

    for (request_text, group) in &groups {
        if group[0].request.is_generic() {
            let _ = writeln!(
                text,
                "\nFor the inquiry about '{request_text}', here are our available options:"
            );
        } else {
            let _ = writeln!(text, "\nFor '{request_text}':");
        }

        for m in dedupe(group) {
            let _ = writeln!(text, "  • {}: ${:.2}", m.item.name, m.item.price);
            items.push(MatchedItem {
                name: m.item.name.clone(),
                price: m.item.price,
                similarity: m.similarity,
                request_text: m.request.text.clone(),
                request_type: m.request.kind.as_str(),
                quantity: m.request.quantity(),
            });
        }
    }
    text.push_str(INVENTORY_TRAILER);

    InventoryContext { text, items }
}

// Highest similarity wins per (name, price); first seen wins ties.
fn dedupe<'a>(group: &[MatchRecord<'a>]) -> Vec<MatchRecord<'a>> {
    let mut unique: IndexMap<(&str, Decimal), MatchRecord<'a>> = IndexMap::new();
    for m in group {
        let key = (m.item.name.as_str(), m.item.price);
        match unique.get_mut(&key) {
            Some(kept) if m.similarity > kept.similarity => *kept = *m,
            Some(_) => {}
            None => {
                unique.insert(key, *m);
            }
        }
    }

    let mut unique: Vec<_> = unique.into_values().collect();
    unique.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ScoringConfig,
        extract::{extract, ProductRequest, RequestKind},
        inventory::InventoryItem,
        matcher::match_inventory,
    };

    fn request(text: &str, kind: RequestKind) -> ProductRequest {
        ProductRequest {
            text: text.to_string(),
            kind,
            source_pattern: "test",
            context: text.to_string(),
        }
    }

    #[test]
    fn test_generic_inquiry_rendering() {
        let inventory = vec![InventoryItem::new("u1", "Gold Chiavari Chair", Decimal::new(850, 2))];
        let requests = extract("Do you have any chairs available?");
        let matches = match_inventory(&requests, &inventory, &ScoringConfig::default());
        let context = build_context(&matches);

        assert!(context.text.starts_with(INVENTORY_HEADER));
        assert!(context
            .text
            .contains("For the inquiry about 'chairs available', here are our available options:"));
        assert!(context.text.contains("• Gold Chiavari Chair: $8.50"));
        assert!(context.text.ends_with(INVENTORY_TRAILER));
        assert!(context.has_matches());
    }

    #[test]
    fn test_no_matches_gives_status_block() {
        let context = build_context(&[]);
        assert_eq!(context.text, NO_MATCH_CONTEXT);
        assert!(!context.has_matches());
    }

    #[test]
    fn test_dedupe_keeps_highest_similarity() {
        let chair = InventoryItem::new("u1", "Gold Chiavari Chair", Decimal::new(850, 2));
        let table = InventoryItem::new("u1", "Round Table", Decimal::new(1500, 2));
        let specific = request("chairs", RequestKind::ProductRequest);
        let quantity = request("chairs", RequestKind::QuantityRequest { quantity: 40 });

        let matches = vec![
            MatchRecord { item: &table, request: &specific, similarity: 0.76 },
            MatchRecord { item: &chair, request: &specific, similarity: 0.8 },
            MatchRecord { item: &chair, request: &quantity, similarity: 0.9 },
        ];
        let context = build_context(&matches);

        assert_eq!(context.items.len(), 2);
        assert_eq!(context.items[0].name, "Gold Chiavari Chair");
        assert_eq!(context.items[0].similarity, 0.9);
        assert_eq!(context.items[0].request_type, "quantity_request");
        assert_eq!(context.items[0].quantity, Some(40));
        assert_eq!(context.items[1].name, "Round Table");
        assert_eq!(context.text.matches("Gold Chiavari Chair").count(), 1);
        assert!(context.text.contains("\nFor 'chairs':\n  • Gold Chiavari Chair: $8.50\n  • Round Table: $15.00\n"));
    }

    #[test]
    fn test_same_name_different_price_kept() {
        let small = InventoryItem::new("u1", "Round Table", Decimal::new(1500, 2));
        let large = InventoryItem::new("u1", "Round Table", Decimal::new(2000, 2));
        let req = request("tables", RequestKind::ProductRequest);
        let matches = vec![
            MatchRecord { item: &small, request: &req, similarity: 0.9 },
            MatchRecord { item: &large, request: &req, similarity: 0.9 },
        ];
        let context = build_context(&matches);
        assert_eq!(context.items.len(), 2);
        assert!(context.text.contains("$15.00"));
        assert!(context.text.contains("$20.00"));
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let chair = InventoryItem::new("u1", "Gold Chiavari Chair", Decimal::new(850, 2));
        let table = InventoryItem::new("u1", "Round Table", Decimal::new(1500, 2));
        let tables = request("tables", RequestKind::ProductRequest);
        let chairs = request("chairs", RequestKind::GenericInquiry);
        let matches = vec![
            MatchRecord { item: &table, request: &tables, similarity: 0.9 },
            MatchRecord { item: &chair, request: &chairs, similarity: 0.7 },
        ];
        let context = build_context(&matches);

        let tables_at = context.text.find("For 'tables'").unwrap();
        let chairs_at = context.text.find("For the inquiry about 'chairs'").unwrap();
        assert!(tables_at < chairs_at);
    }
}
