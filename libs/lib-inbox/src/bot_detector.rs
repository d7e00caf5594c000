use lazy_static::lazy_static;
use regex::{Regex, RegexSet};
use serde::Serialize;

use crate::{config::ScoringConfig, message::sender_address, message::Header};

const BOT_SENDER_PATTERNS: &[&str] = &[
    r"no-?reply",
    r"no[-_.]?reply",
    r"do[-_.]?not[-_.]?reply",
    r"donotreply",
    r"auto[-_.]?reply",
    r"notifications?@",
    r"calendar@",
    r"automated?@",
    r"support@",
    r"help@",
    r"system@",
    r"admin@",
    r"bounce",
    r"mailer[-_.]?daemon",
    r"postmaster",
    r"marketing@",
    r"newsletter",
    r"campaigns?@",
    r"alerts?@",
    r"updates?@",
    r"info@",
    r"service@",
    r"team@",
    r"security@",
    r"billing@",
    r"invoices?@",
    r"receipts?@",
    r"orders?@",
    r"shipping@",
    r"delivery@",
    r"tracking@",
    r"api@",
    r"bot@",
    r"auto@",
    r"robot@",
];

pub const BOT_DOMAINS: &[&str] = &[
    "mailgun.org",
    "sendgrid.net",
    "amazonses.com",
    "mailchimp.com",
    "constantcontact.com",
    "campaignmonitor.com",
    "intercom.io",
    "zendesk.com",
    "freshdesk.com",
    "helpscout.net",
];

const BOT_SUBJECT_PATTERNS: &[&str] = &[
    r"\[automated\]",
    r"\[system\]",
    r"\[notification\]",
    r"unsubscribe",
    r"re:\s*out of office",
    r"delivery status notification",
    r"mail delivery failed",
    r"automatic reply",
    r"auto-?reply",
    r"newsletter",
    r"digest",
    r"weekly\s+report",
    r"monthly\s+report",
    r"daily\s+summary",
    r"password\s+reset",
    r"account\s+verification",
    r"confirm\s+your",
    r"your\s+order",
    r"receipt\s+for",
    r"invoice\s+#",
    r"payment\s+confirmation",
    r"shipping\s+notification",
];

const BOT_BODY_PATTERNS: &[&str] = &[
    r"this\s+is\s+an\s+automated\s+message",
    r"do\s+not\s+reply\s+to\s+this\s+email",
    r"automatically\s+generated",
    r"unsubscribe\s+(here|link|below)",
    r"click\s+here\s+to\s+unsubscribe",
    r"if\s+you\s+no\s+longer\s+wish\s+to\s+receive",
    r"this\s+email\s+was\s+sent\s+automatically",
    r"please\s+do\s+not\s+respond\s+to\s+this\s+email",
    r"system\s+notification",
    r"automated\s+notification",
    r"tracking\s+number",
    r"your\s+order\s+(has\s+been|is)\s+confirmed",
    r"order\s+confirmation",
    r"payment\s+(received|confirmed)",
    r"your\s+receipt",
    r"password\s+(reset|change)\s+requested",
    r"password\s+has\s+been\s+(reset|changed)",
    r"confirm\s+your\s+email\s+address",
    r"account\s+(verification|activated|created)",
    r"please\s+verify\s+your\s+email",
    r"security\s+alert",
    r"unusual\s+login\s+attempt",
    r"your\s+subscription\s+has\s+been\s+(renewed|cancelled)",
    r"delivery\s+status",
    r"failed\s+delivery\s+attempt",
    r"your\s+package\s+is\s+on\s+its\s+way",
    r"download\s+your\s+report",
    r"here\s+is\s+your\s+weekly\s+summary",
    r"here\s+is\s+your\s+daily\s+report",
    r"new\s+comment\s+on\s+your\s+post",
    r"you\s+have\s+a\s+new\s+message",
    r"don['’]?t\s+miss\s+out\s+on",
    r"special\s+offer\s+just\s+for\s+you",
    r"limited\s+time\s+deal",
    r"thank\s+you\s+for\s+registering",
    r"your\s+information\s+was\s+successfully\s+submitted",
    r"we['’]?ll\s+follow\s+up\s+with\s+you",
    r"application\s+(received|submitted)",
    r"explore\s+our\s+open\s+roles",
    r"university\s+recruiting\s+team",
    r"view\s+(this\s+)?(email\s+)?in\s+(your\s+)?browser",
    r"manage\s+(your\s+)?(email\s+)?preferences",
];

const HUMAN_PATTERNS: &[&str] = &[
    r"thanks?\s+(so\s+much\s+|a\s+lot\s+)?for",
    r"thank\s+you",
    r"i\s+think",
    r"i\s+believe",
    r"in\s+my\s+opinion",
    r"what\s+do\s+you\s+think",
    r"let\s+me\s+know",
    r"talk\s+soon",
    r"best\s+regards",
    r"kind\s+regards",
    r"sincerely",
    r"cheers",
    r"hope\s+this\s+helps",
    r"looking\s+forward",
    r"please\s+let\s+me\s+know",
    r"i\s+hope\s+you",
    r"how\s+are\s+you",
];

const LIST_HEADERS: &[&str] = &["list-id", "list-unsubscribe", "list-subscribe"];
const MARKETING_HEADER_MARKERS: &[&str] = &["x-campaign", "x-mailgun", "x-sg-", "x-sendgrid"];

lazy_static! {
    static ref RE_BOT_SENDER: RegexSet = RegexSet::new(BOT_SENDER_PATTERNS).unwrap();
    static ref RE_BOT_SUBJECT: RegexSet = RegexSet::new(BOT_SUBJECT_PATTERNS).unwrap();
    static ref RE_BOT_BODY: RegexSet = RegexSet::new(BOT_BODY_PATTERNS).unwrap();
    static ref RE_HUMAN: RegexSet = RegexSet::new(HUMAN_PATTERNS).unwrap();
    static ref RE_LINK: Regex = Regex::new(r"https?://").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BotSignal {
    Sender,
    Subject,
    Body,
    Headers,
    HumanConversation,
    ShortBody,
    ManyLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotVerdict {
    pub score: i32,
    pub signals: Vec<BotSignal>,
    pub is_bot: bool,
}

/// Additive scorer deciding whether a message was machine generated.
#[derive(Debug, Clone, Default)]
pub struct BotDetector {
    scoring: ScoringConfig,
}

impl BotDetector {
    pub fn new(scoring: ScoringConfig) -> Self {
        Self { scoring }
    }

    pub fn is_bot_email(&self, sender: &str, subject: &str, body: &str, headers: &[Header]) -> bool {
        self.evaluate(sender, subject, body, headers).is_bot
    }

    pub fn evaluate(&self, sender: &str, subject: &str, body: &str, headers: &[Header]) -> BotVerdict {
        let s = &self.scoring;
        let mut score = 0;
        let mut signals = vec![];
        let mut add = |signal: BotSignal, weight: i32| {
            score += weight;
            signals.push(signal);
        };

        if self.is_bot_sender(sender) {
            add(BotSignal::Sender, s.sender_weight);
        }
        if is_bot_subject(subject) {
            add(BotSignal::Subject, s.subject_weight);
        }
        if is_bot_body(body) {
            add(BotSignal::Body, s.body_weight);
        }
        if has_bot_headers(headers) {
            add(BotSignal::Headers, s.header_weight);
        }
        if human_pattern_count(body) >= s.human_min_matches {
            add(BotSignal::HumanConversation, s.human_weight);
        }
        if body.trim().chars().count() < s.short_body_chars {
            add(BotSignal::ShortBody, s.short_body_weight);
        }
        if RE_LINK.find_iter(body).count() > s.max_links {
            add(BotSignal::ManyLinks, s.link_weight);
        }

        BotVerdict {
            score,
            signals,
            is_bot: score >= s.bot_threshold,
        }
    }

    pub fn is_bot_sender(&self, sender: &str) -> bool {
        let address = sender_address(sender);
        if RE_BOT_SENDER.is_match(&address) {
            return true;
        }

        let Some((_, domain)) = address.rsplit_once('@') else {
            return false;
        };
        BOT_DOMAINS
            .iter()
            .copied()
            .chain(self.scoring.extra_bot_domains.iter().map(String::as_str))
            .any(|known| domain == known || domain.ends_with(&format!(".{known}")))
    }
}

pub fn is_bot_subject(subject: &str) -> bool {
    RE_BOT_SUBJECT.is_match(&subject.to_lowercase())
}

pub fn is_bot_body(body: &str) -> bool {
    RE_BOT_BODY.is_match(&body.to_lowercase())
}

pub fn has_bot_headers(headers: &[Header]) -> bool {
    let lookup = |name: &str| {
        headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.trim().to_lowercase())
    };

    if lookup("auto-submitted").is_some_and(|v| v.starts_with("auto-")) {
        return true;
    }
    if lookup("precedence").is_some_and(|v| matches!(v.as_str(), "bulk" | "list" | "junk")) {
        return true;
    }

    headers.iter().any(|h| {
        let name = h.name.to_lowercase();
        LIST_HEADERS.contains(&name.as_str())
            || MARKETING_HEADER_MARKERS.iter().any(|m| name.contains(m))
    })
}

/// Number of distinct conversational phrases found in the body.
pub fn human_pattern_count(body: &str) -> usize {
    RE_HUMAN.matches(&body.to_lowercase()).iter().count()
}
