use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppJsonResult,
    store::{DraftSummary, DynStore, FilterDecision},
};

const DEFAULT_DRAFT_LIMIT: usize = 10;
const DEFAULT_FILTERED_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Deserialize, Debug, Default)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).min(MAX_LIMIT)
    }
}

#[derive(Serialize, Debug)]
pub struct DraftsResponse {
    pub drafts: Vec<DraftSummary>,
    pub total: usize,
}

/// # GET /drafts/:user_id?limit=10
pub async fn recent_drafts(
    State(store): State<DynStore>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppJsonResult<DraftsResponse> {
    let drafts = store
        .recent_drafts(&user_id, query.or(DEFAULT_DRAFT_LIMIT))
        .await?;

    Ok(Json(DraftsResponse {
        total: drafts.len(),
        drafts,
    }))
}

#[derive(Serialize, Debug)]
pub struct FilteredResponse {
    pub filtered_emails: Vec<FilterDecision>,
    /// Count per filter reason over the returned rows
    pub summary: BTreeMap<&'static str, usize>,
    pub total_filtered: usize,
}

/// # GET /filtered/:user_id?limit=20
///
/// Recently suppressed messages, to see why something never got a draft.
pub async fn filtered_emails(
    State(store): State<DynStore>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppJsonResult<FilteredResponse> {
    let filtered_emails = store
        .recent_filtered(&user_id, query.or(DEFAULT_FILTERED_LIMIT))
        .await?;

    let mut summary = BTreeMap::new();
    for decision in &filtered_emails {
        *summary.entry(decision.reason.as_str()).or_insert(0) += 1;
    }

    Ok(Json(FilteredResponse {
        total_filtered: filtered_emails.len(),
        summary,
        filtered_emails,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use lib_inbox::FilterReason;

    use super::*;
    use crate::store::{DraftRecord, DraftStatus, MemoryStore, Store};

    fn draft(message_id: &str, minutes_ago: i64) -> DraftRecord {
        DraftRecord {
            user_id: "u1".to_string(),
            message_id: message_id.to_string(),
            sender: "jordan@example.org".to_string(),
            incoming_subject: "Chairs".to_string(),
            incoming_body: "How much for chairs?".to_string(),
            original_body: "How much for chairs?".to_string(),
            draft: format!("Reply to {message_id}"),
            status: DraftStatus::Generated,
            matched_inventory: vec![],
            received_at: None,
            gmail_draft_id: Some(format!("draft-{message_id}")),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_recent_drafts_newest_first() {
        let memory = Arc::new(MemoryStore::new());
        for (id, minutes_ago) in [("m1", 30), ("m2", 10), ("m3", 20)] {
            memory.record_draft(draft(id, minutes_ago)).await.unwrap();
        }
        let store: DynStore = memory;

        let Json(response) = recent_drafts(
            State(store.clone()),
            Path("u1".to_string()),
            Query(LimitQuery { limit: Some(2) }),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 2);
        assert_eq!(response.drafts[0].message_id, "m2");
        assert_eq!(response.drafts[1].message_id, "m3");
        assert_eq!(response.drafts[0].status, "generated");

        let Json(other) = recent_drafts(
            State(store),
            Path("u2".to_string()),
            Query(LimitQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(other.total, 0);
    }

    #[tokio::test]
    async fn test_filtered_emails_summarised_by_reason() {
        let memory = Arc::new(MemoryStore::new());
        for (id, reason) in [
            ("m1", FilterReason::BotEmail),
            ("m2", FilterReason::BotEmail),
            ("m3", FilterReason::DateFilter),
        ] {
            memory
                .record_filtered(FilterDecision::new("u1", id, reason, "a@b.c", "hi"))
                .await
                .unwrap();
        }
        let store: DynStore = memory;

        let Json(response) = filtered_emails(
            State(store),
            Path("u1".to_string()),
            Query(LimitQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.total_filtered, 3);
        assert_eq!(response.summary.get("bot_email"), Some(&2));
        assert_eq!(response.summary.get("date_filter"), Some(&1));
        assert_eq!(response.summary.len(), 2);
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(LimitQuery { limit: Some(500) }.or(10), MAX_LIMIT);
        assert_eq!(LimitQuery::default().or(10), 10);
    }
}
