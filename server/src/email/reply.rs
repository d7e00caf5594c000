use anyhow::Context;
use lettre::message::{Mailbox as Address, MultiPart};
use lib_inbox::IncomingMessage;

/// A reply waiting to be saved as a draft in the sender's thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReply {
    pub thread_id: String,
    pub to: String,
    pub subject: String,
    /// Message-ID of the message being answered, without angle brackets
    pub in_reply_to: Option<String>,
    pub body: String,
    pub signature_html: String,
}

impl DraftReply {
    pub fn for_message(message: &IncomingMessage, body: &str, signature_html: &str) -> Self {
        Self {
            thread_id: message.thread_id.clone(),
            to: message.sender.clone(),
            subject: reply_subject(&message.subject),
            in_reply_to: message.message_id_header.clone(),
            body: body.to_string(),
            signature_html: signature_html.trim().to_string(),
        }
    }

    pub fn plain_text(&self) -> String {
        if self.signature_html.is_empty() {
            return self.body.clone();
        }
        format!("{}\n\n{}", self.body, signature_text(&self.signature_html))
    }

    pub fn html(&self) -> String {
        let mut html = self.body.replace('\n', "<br>");
        if !self.signature_html.is_empty() {
            html.push_str("<br><br>");
            html.push_str(&self.signature_html);
        }
        format!("<html>\n<body>\n{}\n</body>\n</html>", html)
    }

    /// RFC 2822 bytes with plain and HTML alternatives.
    pub fn to_mime(&self, from: &str) -> anyhow::Result<Vec<u8>> {
        let from: Address = from
            .parse()
            .with_context(|| format!("Invalid 'from' address '{}'", from))?;
        let to: Address = self
            .to
            .parse()
            .with_context(|| format!("Invalid 'to' address '{}'", self.to))?;

        let mut builder = lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(&self.subject);
        if let Some(id) = &self.in_reply_to {
            let id = format!("<{}>", id.trim_matches(|c| c == '<' || c == '>'));
            builder = builder.in_reply_to(id.clone()).references(id);
        }

        let email = builder
            .multipart(MultiPart::alternative_plain_html(self.plain_text(), self.html()))
            .context("Could not build reply")?;

        Ok(email.formatted())
    }
}

/// Prefixes "Re: " unless the subject already carries it.
pub fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Plain-text rendering of an HTML signature, blank lines removed.
pub fn signature_text(signature_html: &str) -> String {
    html2text::from_read(signature_html.as_bytes(), 200)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
