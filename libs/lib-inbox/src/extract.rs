//! Regex scan of email text for product mentions, generic inquiries and quantities.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

static SPECIFIC_PATTERNS: [&str; 6] = [
    r"(?:price|cost|pricing|quote|quotation)\s+(?:for|on|of)?\s*([^.!?]+)",
    r"(?:how much|what.{0,20}cost|what.{0,20}price)\s+(?:for|is|are|would)?\s*([^.!?]+)",
    r"(?:availability|available|do you have|got any)\s+(?:of|for)?\s*([^.!?]+)",
    r"(?:need|looking for|want|interested in|require)\s+(?:some|a|an|the)?\s*([^.!?]+)",
    r"(?:rental|rent|hire)\s+(?:of|for)?\s*([^.!?]+)",
    r"(?:can you provide|do you offer|do you carry)\s+([^.!?]+)",
];

static GENERIC_PATTERNS: [&str; 6] = [
    r"what\s+(?:kind|type|sorts?)\s+of\s+([^.!?]+)\s+(?:do you have|are available|do you offer)",
    r"(?:do you have|got)\s+any\s+([^.!?]+)",
    r"what\s+([^.!?]+)\s+(?:do you have|are available)",
    r"show me\s+(?:your|the|all)?\s*([^.!?]+)",
    r"list\s+(?:of|your)?\s*([^.!?]+)",
    r"what.{0,20}(?:available|inventory|stock|options)\s+(?:for|of)?\s*([^.!?]+)",
];

// Either side of a quantity pattern may hold the number.
static QUANTITY_PATTERNS: [&str; 4] = [
    r"(\d+)\s*(?:x\s*)?([^.!?]+)",
    r"(\d+)\s+(?:pieces?|items?|units?)\s+(?:of\s+)?([^.!?]+)",
    r"([^.!?]+)\s*(?:x|×)\s*(\d+)",
    r"([^.!?]+)\s*[-–]\s*(\d+)\s*(?:pieces?|pcs?|units?)?",
];

pub const MIN_REQUEST_CHARS: usize = 3;

lazy_static! {
    static ref RE_SPECIFIC: Vec<Regex> = compile(&SPECIFIC_PATTERNS);
    static ref RE_GENERIC: Vec<Regex> = compile(&GENERIC_PATTERNS);
    static ref RE_QUANTITY: Vec<Regex> = compile(&QUANTITY_PATTERNS);
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    ProductRequest,
    GenericInquiry,
    QuantityRequest { quantity: u32 },
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// One product mention pulled out of an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRequest {
    pub text: String,
    #[serde(flatten)]
    pub kind: RequestKind,
    pub source_pattern: &'static str,
    /// Full text of the regex match the request came from
    pub context: String,
}

impl ProductRequest {
    pub fn is_generic(&self) -> bool {
        matches!(self.kind, RequestKind::GenericInquiry)
    }

    pub fn quantity(&self) -> Option<u32> {
        match self.kind {
            RequestKind::QuantityRequest { quantity } => Some(quantity),
            _ => None,
        }
    }
}

/// Every request found in `email_text`, in pattern-family order. Overlaps are kept.
pub fn extract(email_text: &str) -> Vec<ProductRequest> {
    extract_with_min_chars(email_text, MIN_REQUEST_CHARS)
}

pub fn extract_with_min_chars(email_text: &str, min_chars: usize) -> Vec<ProductRequest> {
    let text = email_text.to_lowercase();
    let long_enough = |s: &str| s.chars().count() >= min_chars;
    let mut requests = vec![];

    let families = [
        (&*RE_SPECIFIC, &SPECIFIC_PATTERNS, RequestKind::ProductRequest),
        (&*RE_GENERIC, &GENERIC_PATTERNS, RequestKind::GenericInquiry),
    ];
    for (regexes, sources, kind) in families {
        for (re, source) in regexes.iter().zip(sources.iter()) {
            for caps in re.captures_iter(&text) {
                let product = caps[1].trim();
                if long_enough(product) {
                    requests.push(ProductRequest {
                        text: product.to_string(),
                        kind,
                        source_pattern: *source,
                        context: caps[0].to_string(),
                    });
                }
            }
        }
    }

    for (re, source) in RE_QUANTITY.iter().zip(QUANTITY_PATTERNS.iter()) {
        for caps in re.captures_iter(&text) {
            let Some((quantity, product)) = split_quantity(&caps[1], &caps[2]) else {
                continue;
            };
            if long_enough(product) {
                requests.push(ProductRequest {
                    text: product.to_string(),
                    kind: RequestKind::QuantityRequest { quantity },
                    source_pattern: *source,
                    context: caps[0].to_string(),
                });
            }
        }
    }

    requests
}

/// The first group is the quantity iff it is all digits, otherwise the second must parse.
fn split_quantity<'t>(first: &'t str, second: &'t str) -> Option<(u32, &'t str)> {
    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    if is_digits(first) {
        first.parse().ok().map(|q| (q, second.trim()))
    } else {
        second.trim().parse().ok().map(|q| (q, first.trim()))
    }
}
