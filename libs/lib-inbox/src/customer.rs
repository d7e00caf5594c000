use lazy_static::lazy_static;
use regex::RegexSet;
use serde::Serialize;

const CUSTOMER_PATTERNS: &[&str] = &[
    r"my\s+order",
    r"order\s+#?\d+",
    r"tracking\s+number",
    r"invoice\s+#?\d+",
    r"receipt",
    r"purchased",
    r"bought",
    r"payment",
    r"refund",
    r"return",
    r"exchange",
    r"warranty",
    r"delivery",
    r"shipping",
    r"received\s+my",
    r"got\s+my",
    r"when\s+will\s+my.*arrive",
    r"where\s+is\s+my",
];

const RELATIONSHIP_PATTERNS: &[&str] = &[
    r"as\s+discussed",
    r"per\s+our\s+conversation",
    r"following\s+up",
    r"as\s+promised",
    r"like\s+we\s+talked\s+about",
    r"from\s+our\s+meeting",
    r"you\s+mentioned",
    r"when\s+we\s+spoke",
    r"our\s+previous\s+order",
    r"usual\s+order",
    r"same\s+as\s+last\s+time",
    r"i\s+messaged\s+earlier",
    r"i\s+am.*mom",
    r"i\s+was\s+with\s+.*\s+when\s+we",
    r"returning\s+them",
    r"picked\s+up\s+the",
    r"we\s+are.*minutes\s+out",
    r"coming\s+back",
    r"drop\s+off",
    r"pickup\s+.*\s+pedestals",
    r"returning\s+.*\s+pedestals",
];

const PROSPECT_PATTERNS: &[&str] = &[
    r"i\s+am\s+interested\s+in",
    r"can\s+you\s+tell\s+me\s+about",
    r"what\s+do\s+you\s+charge",
    r"do\s+you\s+offer",
    r"i\s+found\s+your",
    r"saw\s+your\s+website",
    r"looking\s+for",
    r"need\s+a\s+quote",
    r"price\s+list",
    r"more\s+information",
    r"first\s+time",
    r"new\s+to\s+your",
    r"heard\s+about\s+you",
    r"wanted\s+to\s+rent",
    r"would\s+like\s+to\s+rent",
    r"would\s+like\s+to\s+inquire",
    r"inquire\s+about",
    r"can\s+you\s+provide",
    r"do\s+you\s+have",
    r"planning\s+.*\s+wedding",
    r"looking\s+at\s+.*\s+renting",
    r"rental\s+inquiry",
    r"quote\s+for",
    r"pricing\s+for",
    r"availability\s+for",
    r"total\s+cost",
    r"delivery.*fees",
    r"pickup.*fees",
    r"rental.*rates",
    r"\bbuying\b",
    r"\bselling\b",
    r"\bbuy\b",
    r"\bsell\b",
    r"\bpurchase\b",
    r"\bpurchasing\b",
    r"want\s+to\s+buy",
    r"want\s+to\s+purchase",
    r"interested\s+in\s+buying",
    r"how\s+much",
    r"what\s+is\s+the\s+price",
    r"what.*cost",
    r"how.*much.*cost",
    r"can\s+i\s+buy",
    r"can\s+i\s+get",
    r"where\s+can\s+i",
    r"need\s+to\s+buy",
    r"want\s+to\s+order",
    r"place\s+an\s+order",
    r"make\s+an\s+order",
    r"business\s+inquiry",
    r"product\s+inquiry",
    r"service\s+inquiry",
    r"questions?\s+about",
    r"tell\s+me\s+more",
    r"learn\s+more",
    r"get\s+more\s+info",
    r"contact.*about",
    r"reach\s+out.*about",
    r"hello.*interested",
    r"hi.*interested",
    r"good\s+morning.*interested",
    r"good\s+afternoon.*interested",
];

const PERSONAL_PATTERNS: &[&str] = &[
    r"how\s+was\s+your\s+weekend",
    r"happy\s+birthday",
    r"congratulations",
    r"how\s+are\s+you\s+doing",
    r"miss\s+you",
    r"see\s+you\s+soon",
    r"talk\s+soon",
    r"call\s+me\s+when",
    r"what\s+are\s+you\s+up\s+to",
    r"how.*family",
    r"vacation",
    r"holiday",
    r"^\s*(okay?|yes|no|thanks?|sure|maybe|alright|got\s+it|sounds?\s+good)\s*$",
];

lazy_static! {
    static ref RE_CUSTOMER: RegexSet = RegexSet::new(CUSTOMER_PATTERNS).unwrap();
    static ref RE_RELATIONSHIP: RegexSet = RegexSet::new(RELATIONSHIP_PATTERNS).unwrap();
    static ref RE_PROSPECT: RegexSet = RegexSet::new(PROSPECT_PATTERNS).unwrap();
    static ref RE_PERSONAL: RegexSet = RegexSet::new(PERSONAL_PATTERNS).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CustomerStatus {
    Customer,
    Prospect,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CustomerScores {
    /// Transaction plus existing-relationship matches
    pub customer: usize,
    pub prospect: usize,
    pub personal: usize,
}

impl CustomerScores {
    pub fn from_body(body: &str) -> Self {
        let body = body.trim().to_lowercase();
        let count = |set: &RegexSet| set.matches(&body).iter().count();

        Self {
            customer: count(&RE_CUSTOMER) + count(&RE_RELATIONSHIP),
            prospect: count(&RE_PROSPECT),
            personal: count(&RE_PERSONAL),
        }
    }

    pub fn status(&self) -> CustomerStatus {
        if self.customer > 0 && self.customer >= self.prospect {
            CustomerStatus::Customer
        } else if self.prospect > 0 && self.prospect > self.personal {
            CustomerStatus::Prospect
        } else {
            // personal chatter and "no signal at all" are both suppressed
            CustomerStatus::Unknown
        }
    }
}

/// Labels a message body as customer, prospect or unknown.
pub fn classify(body: &str) -> CustomerStatus {
    if body.trim().chars().count() < 2 {
        return CustomerStatus::Unknown;
    }

    let scores = CustomerScores::from_body(body);
    let status = scores.status();
    if status == CustomerStatus::Unknown && scores.personal == 0 {
        tracing::debug!(?scores, "No business signal in message body");
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_chatter_is_unknown() {
        let body = "Thanks so much for your help yesterday, talk soon!";
        let scores = CustomerScores::from_body(body);
        assert!(scores.personal > 0);
        assert_eq!(scores.customer, 0);
        assert_eq!(scores.prospect, 0);
        assert_eq!(classify(body), CustomerStatus::Unknown);
    }

    #[test]
    fn test_order_question_is_customer() {
        assert_eq!(
            classify("Hi, where is my order #4521? The tracking number isn't working."),
            CustomerStatus::Customer
        );
    }

    #[test]
    fn test_customer_wins_ties_with_prospect() {
        // "payment" vs "how much"
        let body = "How much was the payment again?";
        let scores = CustomerScores::from_body(body);
        assert_eq!(scores.customer, scores.prospect);
        assert_eq!(classify(body), CustomerStatus::Customer);
    }

    #[test]
    fn test_inquiry_is_prospect() {
        assert_eq!(
            classify("Hello, I found your website and I'm looking for chairs. Do you have any available?"),
            CustomerStatus::Prospect
        );
    }

    #[test]
    fn test_minimal_reply_is_unknown() {
        assert_eq!(classify("ok"), CustomerStatus::Unknown);
        assert_eq!(classify("Sounds good"), CustomerStatus::Unknown);
        assert_eq!(classify(" "), CustomerStatus::Unknown);
    }

    #[test]
    fn test_no_signal_is_unknown() {
        assert_eq!(
            classify("The weather has been lovely this week in the valley."),
            CustomerStatus::Unknown
        );
    }

    #[test]
    fn test_status_string_form() {
        assert_eq!(CustomerStatus::Prospect.to_string(), "prospect");
    }
}
