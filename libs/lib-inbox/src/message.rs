use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref RE_ANGLE_ADDRESS: Regex = Regex::new(r"<([^<>]+)>").unwrap();
    static ref RE_DISPLAY_NAME: Regex = Regex::new(r"^([^<]+)<.*>$").unwrap();
    static ref RE_REPLY_HEADER: Regex =
        Regex::new(r"(?i)^\s*(on\s.+\swrote:|-+\s*original message\s*-+)\s*$").unwrap();
    static ref RE_SIGN_OFF: Regex = Regex::new(
        r"(?i)^\s*((best|kind|warm|warmest)\s+regards|regards|thanks|thank\s+you|many\s+thanks|cheers|sincerely|best|sent\s+from\s+my\s+\w+)[,!.]?\s*$"
    )
    .unwrap();
    static ref RE_URL_LINE: Regex = Regex::new(r"^\s*(https?://\S+|www\.\S+)\s*$").unwrap();
    static ref RE_EMPHASIS: Regex = Regex::new(r"\*+.*?\*+").unwrap();
    static ref RE_PHONE: Regex = Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap();
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Sign-off lines are only treated as a signature this close to the end.
const SIGN_OFF_WINDOW: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One inbound message as delivered by the mailbox provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub thread_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub headers: Vec<Header>,
    /// RFC 822 `Message-ID`, used for reply threading
    pub message_id_header: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

impl IncomingMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn sender_address(&self) -> String {
        sender_address(&self.sender)
    }

    pub fn sender_first_name(&self) -> String {
        sender_first_name(&self.sender)
    }
}

/// Lower-cased address part of a `From` value.
pub fn sender_address(sender: &str) -> String {
    match RE_ANGLE_ADDRESS.captures(sender) {
        Some(caps) => caps[1].trim().to_lowercase(),
        None => sender.trim().to_lowercase(),
    }
}

/// First name for the greeting: "John Doe <j@x.com>" and "john.doe@x.com" both give "John".
pub fn sender_first_name(sender: &str) -> String {
    let sender = sender.trim();

    if let Some(caps) = RE_DISPLAY_NAME.captures(sender) {
        let full_name = caps[1].trim().trim_matches('"').trim();
        if let Some(first) = full_name.split_whitespace().next() {
            return first.to_string();
        }
    }

    let name_part = match sender.split_once('@') {
        Some((local, _)) => local.trim_start_matches('<').replace(['.', '_'], " "),
        None => sender.to_string(),
    };

    name_part
        .split_whitespace()
        .next()
        .map(title_case)
        .unwrap_or_default()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedBody {
    pub text: String,
    pub signature: Option<String>,
}

/// Strips reply history, signature, link-only lines, emphasis markup and phone numbers.
pub fn clean_body(raw: &str) -> CleanedBody {
    let lines: Vec<&str> = raw
        .lines()
        .take_while(|line| !RE_REPLY_HEADER.is_match(line))
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect();

    let (body_lines, signature) = split_signature(&lines);

    let joined = body_lines
        .iter()
        .filter(|line| !RE_URL_LINE.is_match(line.trim()))
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let cleaned = RE_EMPHASIS.replace_all(&joined, "");
    let cleaned = RE_PHONE.replace_all(&cleaned, "");
    let cleaned = RE_WHITESPACE.replace_all(&cleaned, " ");

    CleanedBody {
        text: cleaned.trim().to_string(),
        signature,
    }
}

fn split_signature<'a>(lines: &[&'a str]) -> (Vec<&'a str>, Option<String>) {
    let delimiter = lines
        .iter()
        .position(|line| line.trim_end() == "--");
    let sign_off = || {
        let window_start = lines.len().saturating_sub(SIGN_OFF_WINDOW);
        lines
            .iter()
            .enumerate()
            .skip(window_start)
            .find(|(_, line)| RE_SIGN_OFF.is_match(line))
            .map(|(i, _)| i)
    };

    match delimiter.or_else(sign_off) {
        Some(at) => {
            let signature = lines[at..]
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty() && *line != "--")
                .collect::<Vec<_>>()
                .join("\n");
            let signature = (!signature.is_empty()).then_some(signature);
            (lines[..at].to_vec(), signature)
        }
        None => (lines.to_vec(), None),
    }
}
