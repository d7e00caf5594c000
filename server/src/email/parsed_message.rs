use anyhow::Context;
use chrono::{DateTime, Utc};
use lib_inbox::{Header, IncomingMessage};
use mail_parser::MessageParser;

pub const NO_SUBJECT: &str = "(No Subject)";
pub const UNKNOWN_SENDER: &str = "(Unknown Sender)";

/// A Gmail RAW message decoded into the fields the pipeline reads.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub id: String,
    pub thread_id: String,
    pub internal_date: i64,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub message_id: Option<String>,
    pub headers: Vec<Header>,
}

impl ParsedMessage {
    pub fn from_gmail_message(msg: google_gmail1::api::Message) -> anyhow::Result<Self> {
        let id = msg.id.clone().unwrap_or_default();
        let thread_id = msg.thread_id.clone().unwrap_or_default();
        let internal_date = msg.internal_date.unwrap_or_default();
        let raw = msg
            .raw
            .as_ref()
            .context(format!("No raw message found in message response: {}", id))?;

        let parsed = Self::from_raw(raw)?;
        Ok(ParsedMessage {
            id,
            thread_id,
            internal_date,
            ..parsed
        })
    }

    pub fn from_raw(raw: &[u8]) -> anyhow::Result<Self> {
        let msg = MessageParser::default()
            .parse(raw)
            .context("Could not parse RFC 822 message")?;

        let from = msg.from().and_then(|f| f.first()).map(|addr| {
            match (addr.name(), addr.address()) {
                (Some(name), Some(address)) => format!("{} <{}>", name, address),
                (None, Some(address)) => address.to_string(),
                (Some(name), None) => name.to_string(),
                (None, None) => String::new(),
            }
        });
        let body = msg
            .body_text(0)
            .map(|b| b.to_string())
            .or_else(|| msg.body_html(0).map(|html| html2text::from_read(html.as_bytes(), 400)));
        let headers = msg
            .headers()
            .iter()
            .map(|h| Header::new(h.name(), h.value().as_text().unwrap_or_default()))
            .collect();

        Ok(ParsedMessage {
            from,
            subject: msg.subject().map(|s| s.to_string()),
            body,
            message_id: msg.message_id().map(|id| id.to_string()),
            headers,
            ..Default::default()
        })
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        (self.internal_date > 0)
            .then(|| DateTime::from_timestamp_millis(self.internal_date))
            .flatten()
    }

    pub fn into_incoming(self) -> IncomingMessage {
        let received_at = self.received_at();
        IncomingMessage {
            id: self.id,
            thread_id: self.thread_id,
            sender: self.from.unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            subject: self.subject.unwrap_or_else(|| NO_SUBJECT.to_string()),
            body: self.body.unwrap_or_default(),
            headers: self.headers,
            message_id_header: self.message_id,
            received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "From: Jordan Lee <jordan@example.org>\r\n\
To: owner@example.com\r\n\
Subject: Chair rental\r\n\
Message-ID: <abc123@example.org>\r\n\
List-Unsubscribe: <mailto:unsub@example.org>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hi, do you have any chairs available for June 5?\r\n";

    #[test]
    fn test_from_raw() {
        let parsed = ParsedMessage::from_raw(RAW.as_bytes()).unwrap();
        assert_eq!(parsed.from.as_deref(), Some("Jordan Lee <jordan@example.org>"));
        assert_eq!(parsed.subject.as_deref(), Some("Chair rental"));
        assert_eq!(parsed.message_id.as_deref(), Some("abc123@example.org"));
        assert!(parsed.body.unwrap().contains("any chairs available"));
        assert!(parsed
            .headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("List-Unsubscribe")));
    }

    #[test]
    fn test_into_incoming_defaults() {
        let parsed = ParsedMessage {
            id: "m1".to_string(),
            internal_date: 1_735_689_600_000,
            ..Default::default()
        };
        let incoming = parsed.into_incoming();
        assert_eq!(incoming.sender, UNKNOWN_SENDER);
        assert_eq!(incoming.subject, NO_SUBJECT);
        assert_eq!(
            incoming.received_at.unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_gmail_message_without_raw() {
        let msg = google_gmail1::api::Message {
            id: Some("m1".to_string()),
            ..Default::default()
        };
        assert!(ParsedMessage::from_gmail_message(msg).is_err());
    }
}
