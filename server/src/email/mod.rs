pub mod client;
pub mod parsed_message;
pub mod reply;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use lib_inbox::IncomingMessage;

pub use client::GmailClient;
pub use reply::DraftReply;

pub type DynMailbox = Arc<dyn Mailbox>;

/// The slice of a mailbox provider the monitor needs.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Ids of primary-inbox messages, newest first, optionally received after `after`.
    async fn list_message_ids(&self, after: Option<NaiveDate>) -> anyhow::Result<Vec<String>>;

    async fn get_message(&self, message_id: &str) -> anyhow::Result<IncomingMessage>;

    /// Saves the reply as a draft in the original thread and returns the draft id.
    async fn create_draft(&self, reply: &DraftReply) -> anyhow::Result<String>;
}
