use serde::{Deserialize, Serialize};

use crate::{
    bot_detector::BotDetector,
    config::ScoringConfig,
    context::{build_context, InventoryContext},
    customer::{classify, CustomerStatus},
    extract::{extract_with_min_chars, ProductRequest},
    inventory::InventoryItem,
    matcher::match_inventory,
    message::IncomingMessage,
};

/// Why a message was suppressed. Stored next to the message id so it is never evaluated twice.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterReason {
    BotEmail,
    UnknownCustomer,
    EmptyBody,
    DateFilter,
    ApiError,
    ProcessingError,
    /// A mailbox draft was created but its record could not be written
    DraftNotRecorded,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    Accept(CustomerStatus),
    Reject(FilterReason),
}

/// Inventory block for one message together with the requests that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryLookup {
    pub requests: Vec<ProductRequest>,
    pub context: InventoryContext,
}

/// The synchronous part of message handling: screening and inventory lookup.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    scoring: ScoringConfig,
    bot_detector: BotDetector,
}

impl Pipeline {
    pub fn new(scoring: ScoringConfig) -> Self {
        Self {
            bot_detector: BotDetector::new(scoring.clone()),
            scoring,
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn screen(&self, message: &IncomingMessage) -> Screening {
        if message.body.trim().chars().count() < self.scoring.min_body_chars {
            return Screening::Reject(FilterReason::EmptyBody);
        }

        let verdict = self.bot_detector.evaluate(
            &message.sender,
            &message.subject,
            &message.body,
            &message.headers,
        );
        if verdict.is_bot {
            tracing::debug!(
                "Bot score {} for message {}: {:?}",
                verdict.score,
                message.id,
                verdict.signals
            );
            return Screening::Reject(FilterReason::BotEmail);
        }

        match classify(&message.body) {
            CustomerStatus::Unknown => Screening::Reject(FilterReason::UnknownCustomer),
            status => Screening::Accept(status),
        }
    }

    pub fn inventory_context(
        &self,
        subject: &str,
        body: &str,
        inventory: &[InventoryItem],
    ) -> InventoryLookup {
        let requests = extract_with_min_chars(
            &format!("{subject} {body}"),
            self.scoring.min_request_chars,
        );
        let matches = match_inventory(&requests, inventory, &self.scoring);
        let context = build_context(&matches);

        InventoryLookup { requests, context }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn message(sender: &str, subject: &str, body: &str) -> IncomingMessage {
        IncomingMessage {
            id: "m1".to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_body_first() {
        let pipeline = Pipeline::default();
        let msg = message("no-reply@nvidia.com", "Your application has been received", "  hi  ");
        assert_eq!(pipeline.screen(&msg), Screening::Reject(FilterReason::EmptyBody));
    }

    #[test]
    fn test_bot_rejected() {
        let pipeline = Pipeline::default();
        let msg = message(
            "no-reply@nvidia.com",
            "Your application has been received",
            "We have received your application and will be in touch.",
        );
        assert_eq!(pipeline.screen(&msg), Screening::Reject(FilterReason::BotEmail));
    }

    #[test]
    fn test_personal_note_rejected_as_unknown() {
        let pipeline = Pipeline::default();
        let msg = message(
            "Sam Friend <sam@gmail.com>",
            "hey",
            "Thanks so much for your help yesterday, talk soon!",
        );
        assert_eq!(
            pipeline.screen(&msg),
            Screening::Reject(FilterReason::UnknownCustomer)
        );
    }

    #[test]
    fn test_prospect_accepted() {
        let pipeline = Pipeline::default();
        let msg = message(
            "Jordan Lee <jordan@example.org>",
            "Wedding rentals",
            "Hi, I'm interested in renting chairs for my wedding. Do you have any chairs available?",
        );
        assert!(matches!(pipeline.screen(&msg), Screening::Accept(_)));
    }

    #[test]
    fn test_inventory_context_scans_subject_and_body() {
        let pipeline = Pipeline::default();
        let inventory = vec![
            InventoryItem::new("u1", "Round Table", Decimal::new(1500, 2)),
            InventoryItem::new("u1", "Gold Chiavari Chair", Decimal::new(850, 2)),
        ];
        let lookup = pipeline.inventory_context("Quote", "We need 5 tables.", &inventory);

        assert!(!lookup.requests.is_empty());
        assert!(lookup.context.has_matches());
        assert_eq!(lookup.context.items[0].name, "Round Table");
        assert!(lookup.context.text.contains("• Round Table: $15.00"));
    }

    #[test]
    fn test_inventory_context_without_requests() {
        let pipeline = Pipeline::default();
        let inventory = vec![InventoryItem::new("u1", "Round Table", Decimal::new(1500, 2))];
        let lookup = pipeline.inventory_context("Hello", "Just checking in about our meeting.", &inventory);
        assert!(!lookup.context.has_matches());
    }

    #[test]
    fn test_filter_reason_names() {
        assert_eq!(FilterReason::BotEmail.to_string(), "bot_email");
        assert_eq!(FilterReason::UnknownCustomer.as_str(), "unknown_customer");
        assert_eq!(
            serde_json::to_string(&FilterReason::DateFilter).unwrap(),
            "\"date_filter\""
        );
        assert_eq!("api_error".parse::<FilterReason>().unwrap(), FilterReason::ApiError);
        assert_eq!(FilterReason::DraftNotRecorded.as_str(), "draft_not_recorded");
    }
}
