extern crate google_gmail1 as gmail1;

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use chrono::NaiveDate;
use gmail1::api::{Draft, ListMessagesResponse, Message};
use leaky_bucket::RateLimiter;
use lib_inbox::IncomingMessage;
use serde_json::json;

use super::{parsed_message::ParsedMessage, reply::DraftReply, Mailbox};
use crate::HttpClient;

macro_rules! gmail_url {
    ($($params:expr),*) => {
        {
            const GMAIL_ENDPOINT: &str = "https://www.googleapis.com/gmail/v1/users/me";
            let list_params = vec![$($params),*];
            let path = list_params.join("/");
            format!("{}/{}", GMAIL_ENDPOINT, path)
        }
    };
}

const GMAIL_QUOTA_PER_SECOND: usize = 250;
const QUOTA_MESSAGES_LIST: usize = 5;
const QUOTA_MESSAGES_GET: usize = 5;
const QUOTA_DRAFTS_CREATE: usize = 10;

pub const PRIMARY_INBOX_QUERY: &str = "category:primary -label:^auto";

#[derive(Debug, Clone)]
pub struct GmailClient {
    http_client: HttpClient,
    access_token: String,
    rate_limiter: Arc<RateLimiter>,
    max_results: u32,
    pub email_address: String,
}

impl GmailClient {
    pub fn new(
        http_client: HttpClient,
        access_token: String,
        email_address: String,
        max_results: u32,
    ) -> Self {
        let rate_limiter = Arc::new(
            RateLimiter::builder()
                .initial(GMAIL_QUOTA_PER_SECOND)
                .interval(Duration::from_secs(1))
                .refill(GMAIL_QUOTA_PER_SECOND)
                .build(),
        );

        GmailClient {
            http_client,
            access_token,
            rate_limiter,
            max_results,
            email_address,
        }
    }

    pub async fn get_message_list(
        &self,
        after: Option<NaiveDate>,
    ) -> anyhow::Result<ListMessagesResponse> {
        self.rate_limiter.acquire(QUOTA_MESSAGES_LIST).await;

        let query = vec![
            ("q".to_string(), list_query(after)),
            ("maxResults".to_string(), self.max_results.to_string()),
        ];
        let resp = self
            .http_client
            .get(gmail_url!("messages"))
            .query(&query)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error listing messages: {:?}", json));
        }

        resp.json::<ListMessagesResponse>()
            .await
            .context("Error parsing message list")
    }

    pub async fn get_message_by_id(&self, message_id: &str) -> anyhow::Result<Message> {
        self.rate_limiter.acquire(QUOTA_MESSAGES_GET).await;
        let resp = self
            .http_client
            .get(gmail_url!("messages", message_id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "RAW")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error getting message {}: {:?}", message_id, json));
        }

        resp.json::<Message>().await.context("Error getting message")
    }

    /// Creates a draft from a base64url-encoded RFC 2822 message.
    pub async fn create_draft_raw(
        &self,
        raw_message: &str,
        thread_id: Option<&str>,
    ) -> anyhow::Result<Draft> {
        self.rate_limiter.acquire(QUOTA_DRAFTS_CREATE).await;

        let mut message = json!({
            "raw": raw_message
        });
        if let Some(tid) = thread_id {
            message["threadId"] = json!(tid);
        }

        let resp = self
            .http_client
            .post(gmail_url!("drafts"))
            .bearer_auth(&self.access_token)
            .json(&json!({ "message": message }))
            .send()
            .await?;

        let data = resp.json::<serde_json::Value>().await?;

        if let Some(error) = data.get("error") {
            return Err(anyhow!("Error creating draft: {:?}", error));
        }

        serde_json::from_value(data).context("Failed to parse draft response")
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_message_ids(&self, after: Option<NaiveDate>) -> anyhow::Result<Vec<String>> {
        let list = self.get_message_list(after).await?;
        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    async fn get_message(&self, message_id: &str) -> anyhow::Result<IncomingMessage> {
        let message = self.get_message_by_id(message_id).await?;
        let parsed = ParsedMessage::from_gmail_message(message)?;
        Ok(parsed.into_incoming())
    }

    async fn create_draft(&self, reply: &DraftReply) -> anyhow::Result<String> {
        let raw = URL_SAFE.encode(reply.to_mime(&self.email_address)?);
        let thread_id = (!reply.thread_id.is_empty()).then_some(reply.thread_id.as_str());
        let draft = self.create_draft_raw(&raw, thread_id).await?;
        draft.id.context("Draft response had no id")
    }
}

fn list_query(after: Option<NaiveDate>) -> String {
    match after {
        Some(date) => format!("{} after:{}", PRIMARY_INBOX_QUERY, date.format("%Y/%m/%d")),
        None => PRIMARY_INBOX_QUERY.to_string(),
    }
}
