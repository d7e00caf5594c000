use crate::{
    config::ScoringConfig,
    extract::ProductRequest,
    inventory::InventoryItem,
    normalize::canonical,
    similarity::score_canonical,
};

/// One request/item pairing that cleared the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRecord<'a> {
    pub item: &'a InventoryItem,
    pub request: &'a ProductRequest,
    pub similarity: f64,
}

/// Scores every request against every catalog item and keeps the best few per request.
///
/// Generic inquiries get a lower threshold and a longer list; ties keep catalog order.
pub fn match_inventory<'a>(
    requests: &'a [ProductRequest],
    inventory: &'a [InventoryItem],
    scoring: &ScoringConfig,
) -> Vec<MatchRecord<'a>> {
    let catalog: Vec<(&InventoryItem, String)> = inventory
        .iter()
        .map(|item| (item, canonical(&item.name)))
        .collect();

    let mut matches = vec![];
    for request in requests {
        let is_generic = request.is_generic();
        let threshold = scoring.effective_threshold(is_generic);
        let wanted = canonical(&request.text);

        let mut candidates: Vec<MatchRecord> = catalog
            .iter()
            .map(|(item, name)| MatchRecord {
                item: *item,
                request,
                similarity: score_canonical(&wanted, name),
            })
            .filter(|m| m.similarity >= threshold)
            .collect();

        candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        candidates.truncate(scoring.top_n(is_generic));
        matches.extend(candidates);
    }

    matches
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::extract::extract;

    fn catalog() -> Vec<InventoryItem> {
        [
            ("Gold Chiavari Chair", 850),
            ("White Folding Chair", 300),
            ("Round Table", 1500),
            ("Banquet Table", 1200),
            ("Frame Tent 20x20", 45000),
        ]
        .into_iter()
        .map(|(name, cents)| InventoryItem::new("u1", name, Decimal::new(cents, 2)))
        .collect()
    }

    #[test]
    fn test_generic_inquiry_uses_lower_threshold() {
        let inventory = vec![InventoryItem::new("u1", "Gold Chiavari Chair", Decimal::new(850, 2))];
        let requests = extract("Do you have any chairs available?");
        let matches = match_inventory(&requests, &inventory, &ScoringConfig::default());

        let generic = matches
            .iter()
            .find(|m| m.request.is_generic())
            .expect("generic match");
        assert_eq!(generic.item.name, "Gold Chiavari Chair");
        assert!(generic.similarity >= 0.525);
    }

    #[test]
    fn test_quantity_request_matches_subset() {
        let inventory = vec![InventoryItem::new("u1", "Round Table", Decimal::new(1500, 2))];
        let requests = extract("5 tables");
        let matches = match_inventory(&requests, &inventory, &ScoringConfig::default());

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].request.quantity(), Some(5));
        assert!(matches[0].similarity >= 0.7);
    }

    #[test]
    fn test_specific_requests_keep_top_three() {
        let inventory = catalog();
        let requests = extract("I need tables and chairs for a wedding");
        let scoring = ScoringConfig {
            match_threshold: 0.5,
            ..Default::default()
        };
        let matches = match_inventory(&requests, &inventory, &scoring);

        for request in &requests {
            let per_request = matches
                .iter()
                .filter(|m| std::ptr::eq(m.request, request))
                .count();
            assert!(per_request <= 3);
        }
    }

    #[test]
    fn test_sorted_by_similarity_per_request() {
        let inventory = catalog();
        let requests = extract("What kind of chairs do you have?");
        let matches = match_inventory(&requests, &inventory, &ScoringConfig::default());

        assert!(!matches.is_empty());
        for request in &requests {
            let scores: Vec<f64> = matches
                .iter()
                .filter(|m| std::ptr::eq(m.request, request))
                .map(|m| m.similarity)
                .collect();
            assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn test_matching_is_idempotent() {
        let inventory = catalog();
        let requests = extract("Price for round tables and 40 gold chairs");
        let scoring = ScoringConfig::default();
        let first = match_inventory(&requests, &inventory, &scoring);
        let second = match_inventory(&requests, &inventory, &scoring);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_match_is_empty() {
        let inventory = catalog();
        let requests = extract("Do you offer wedding photography?");
        assert!(match_inventory(&requests, &inventory, &ScoringConfig::default()).is_empty());
    }
}
