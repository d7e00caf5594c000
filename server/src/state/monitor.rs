use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering::Relaxed},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use derive_more::Display;
use futures::FutureExt;
use lib_inbox::{clean_body, FilterReason, IncomingMessage, Pipeline, Screening};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    email::{
        parsed_message::{NO_SUBJECT, UNKNOWN_SENDER},
        DraftReply, DynMailbox,
    },
    prompt::{
        draft::{draft_prompt, DraftPromptInput},
        DynLanguageModel,
    },
    server_config::Settings,
    store::{DraftRecord, DraftStatus, DynStore, FilterDecision},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub max_consecutive_failures: u32,
}

impl From<&Settings> for MonitorSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            error_backoff: Duration::from_secs(settings.error_backoff_secs),
            max_consecutive_failures: settings.max_consecutive_failures,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1800),
            error_backoff: Duration::from_secs(60),
            max_consecutive_failures: 3,
        }
    }
}

/// Counters shared between a running loop and whoever reports on it.
#[derive(Debug, Default)]
pub struct MonitorStats {
    iterations: AtomicU64,
    drafted: AtomicU64,
    filtered: AtomicU64,
    failed: AtomicU64,
    consecutive_failures: AtomicU32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatsSnapshot {
    pub iterations: u64,
    pub drafted: u64,
    pub filtered: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
}

impl MonitorStats {
    pub fn snapshot(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            iterations: self.iterations.load(Relaxed),
            drafted: self.drafted.load(Relaxed),
            filtered: self.filtered.load(Relaxed),
            failed: self.failed.load(Relaxed),
            consecutive_failures: self.consecutive_failures.load(Relaxed),
        }
    }

    fn add(&self, summary: &IterationSummary) {
        self.iterations.fetch_add(1, Relaxed);
        self.drafted.fetch_add(summary.drafted as u64, Relaxed);
        self.filtered.fetch_add(summary.filtered as u64, Relaxed);
        self.failed.fetch_add(summary.failed as u64, Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    AlreadySeen,
    Filtered(FilterReason),
    Drafted,
    GenerationFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IterationSummary {
    pub listed: usize,
    pub already_seen: usize,
    pub filtered: usize,
    pub drafted: usize,
    pub failed: usize,
}

impl IterationSummary {
    fn add(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::AlreadySeen => self.already_seen += 1,
            MessageOutcome::Filtered(_) => self.filtered += 1,
            MessageOutcome::Drafted => self.drafted += 1,
            MessageOutcome::GenerationFailed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MonitorExit {
    #[display("cancelled")]
    Cancelled,
    #[display("too many consecutive failures")]
    TooManyFailures,
}

/// Everything one user's monitoring loop needs.
#[derive(Clone)]
pub struct MonitorContext {
    pub user_id: String,
    pub store: DynStore,
    pub mailbox: DynMailbox,
    pub llm: DynLanguageModel,
    pub pipeline: Arc<Pipeline>,
    pub settings: MonitorSettings,
}

impl MonitorContext {
    /// One poll: list the inbox and handle each message in listing order.
    /// Stops between messages once `token` is cancelled.
    pub async fn run_iteration(
        &self,
        token: &CancellationToken,
    ) -> anyhow::Result<IterationSummary> {
        let created_at = self
            .store
            .account_created_at(&self.user_id)
            .await
            .context("Failed to read account creation time")?;
        let message_ids = self
            .mailbox
            .list_message_ids(created_at.map(|c| c.date_naive()))
            .await
            .context("Failed to list messages")?;

        let mut summary = IterationSummary {
            listed: message_ids.len(),
            ..Default::default()
        };

        for message_id in message_ids {
            if token.is_cancelled() {
                tracing::info!("Monitoring for {} cancelled mid-iteration", self.user_id);
                break;
            }
            match self.process_message(&message_id, created_at).await {
                Ok(outcome) => summary.add(outcome),
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        "Could not process message {} for {}: {:?}",
                        message_id,
                        self.user_id,
                        e
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Handles a single message end to end. Errors returned here come from the store; every other
    /// failure is recorded against the message so it is not evaluated again.
    pub async fn process_message(
        &self,
        message_id: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MessageOutcome> {
        if self.store.is_seen(&self.user_id, message_id).await? {
            return Ok(MessageOutcome::AlreadySeen);
        }

        let message = match self.mailbox.get_message(message_id).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to fetch message {}: {:?}", message_id, e);
                return self
                    .record_filtered(message_id, FilterReason::ApiError, UNKNOWN_SENDER, NO_SUBJECT)
                    .await;
            }
        };

        match self.evaluate(&message, created_at).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!("Error processing message {}: {:?}", message.id, e);
                self.record_filtered(
                    message_id,
                    FilterReason::ProcessingError,
                    &message.sender,
                    &message.subject,
                )
                .await
            }
        }
    }

    async fn evaluate(
        &self,
        message: &IncomingMessage,
        created_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MessageOutcome> {
        if let (Some(created_at), Some(received_at)) = (created_at, message.received_at) {
            if received_at <= created_at {
                return self.reject(message, FilterReason::DateFilter).await;
            }
        }

        let status = match self.pipeline.screen(message) {
            Screening::Reject(reason) => return self.reject(message, reason).await,
            Screening::Accept(status) => status,
        };

        let cleaned = clean_body(&message.body);
        if cleaned.text.chars().count() < self.pipeline.scoring().min_cleaned_body_chars {
            return self.reject(message, FilterReason::EmptyBody).await;
        }

        let inventory = self.store.fetch_inventory(&self.user_id).await?;
        let tone = self.store.fetch_tone(&self.user_id).await?;
        let brand = self.store.fetch_brand(&self.user_id).await?;

        let lookup = self
            .pipeline
            .inventory_context(&message.subject, &cleaned.text, &inventory);
        tracing::debug!(
            "Message {} from {} customer: {} requests, {} matched items",
            message.id,
            status,
            lookup.requests.len(),
            lookup.context.items.len()
        );

        let sender_name = message.sender_first_name();
        let prompt = draft_prompt(&DraftPromptInput {
            tone: tone.as_ref(),
            brand: &brand,
            inventory: &lookup.context,
            sender_name: &sender_name,
            subject: &message.subject,
            body: &cleaned.text,
        });

        let mut record = DraftRecord {
            user_id: self.user_id.clone(),
            message_id: message.id.clone(),
            sender: message.sender.clone(),
            incoming_subject: message.subject.clone(),
            incoming_body: cleaned.text.clone(),
            original_body: message.body.clone(),
            draft: String::new(),
            status: DraftStatus::Generated,
            matched_inventory: lookup.context.items,
            received_at: message.received_at,
            gmail_draft_id: None,
            created_at: Utc::now(),
        };

        let text = match self.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Draft generation failed for {}: {:?}", message.id, e);
                record.status = DraftStatus::GenerationFailed(e.to_string());
                self.store.record_draft(record).await?;
                return Ok(MessageOutcome::GenerationFailed);
            }
        };

        let reply = DraftReply::for_message(message, &text, &brand.signature);
        let draft_id = self
            .mailbox
            .create_draft(&reply)
            .await
            .context("Failed to create draft")?;

        record.draft = text;
        record.gmail_draft_id = Some(draft_id.clone());
        if let Err(e) = self.store.record_draft(record).await {
            tracing::error!(
                "Draft {} was created for message {} of {} but could not be recorded: {:?}",
                draft_id,
                message.id,
                self.user_id,
                e
            );
            return self.reject(message, FilterReason::DraftNotRecorded).await;
        }

        tracing::info!("Drafted reply to {} for {}", message.id, self.user_id);
        Ok(MessageOutcome::Drafted)
    }

    async fn reject(
        &self,
        message: &IncomingMessage,
        reason: FilterReason,
    ) -> anyhow::Result<MessageOutcome> {
        self.record_filtered(&message.id, reason, &message.sender, &message.subject)
            .await
    }

    async fn record_filtered(
        &self,
        message_id: &str,
        reason: FilterReason,
        sender: &str,
        subject: &str,
    ) -> anyhow::Result<MessageOutcome> {
        tracing::info!(
            "Filtered message {} for {}: {}",
            message_id,
            self.user_id,
            reason
        );
        self.store
            .record_filtered(FilterDecision::new(
                &self.user_id,
                message_id,
                reason,
                sender,
                subject,
            ))
            .await?;
        Ok(MessageOutcome::Filtered(reason))
    }
}

/// Polls until cancelled or until too many iterations fail in a row.
pub async fn run_monitor(
    ctx: MonitorContext,
    stats: Arc<MonitorStats>,
    token: CancellationToken,
) -> MonitorExit {
    let settings = ctx.settings;
    let mut consecutive_failures = 0;
    tracing::info!("Starting monitoring for {}", ctx.user_id);

    loop {
        if token.is_cancelled() {
            return MonitorExit::Cancelled;
        }

        let result = AssertUnwindSafe(ctx.run_iteration(&token))
            .catch_unwind()
            .await;

        let delay = match result {
            Ok(Ok(summary)) => {
                consecutive_failures = 0;
                stats.add(&summary);
                tracing::info!("Monitoring iteration for {}: {:?}", ctx.user_id, summary);
                settings.poll_interval
            }
            Ok(Err(e)) => {
                consecutive_failures += 1;
                tracing::error!(
                    "Monitoring iteration failed for {} ({}/{}): {:?}",
                    ctx.user_id,
                    consecutive_failures,
                    settings.max_consecutive_failures,
                    e
                );
                settings.error_backoff
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());
                consecutive_failures += 1;
                tracing::error!("Monitoring loop for {} panicked: {}", ctx.user_id, msg);
                settings.error_backoff
            }
        };
        stats.consecutive_failures.store(consecutive_failures, Relaxed);

        if consecutive_failures >= settings.max_consecutive_failures {
            tracing::warn!(
                "Stopping monitoring for {} after {} consecutive failures",
                ctx.user_id,
                consecutive_failures
            );
            return MonitorExit::TooManyFailures;
        }

        tokio::select! {
            _ = token.cancelled() => return MonitorExit::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
