use std::sync::Arc;

use anyhow::{anyhow, Context};
use lib_inbox::Pipeline;

use super::{monitor::MonitorContext, supervisor::MonitorFactory, MonitorSettings};
use crate::{
    email::GmailClient,
    prompt::DynLanguageModel,
    server_config::{cfg, AccountConfig},
    store::DynStore,
    HttpClient,
};

/// Builds monitors for the accounts listed in the config file, talking to Gmail directly.
pub struct AccountMonitorFactory {
    http_client: HttpClient,
    store: DynStore,
    llm: DynLanguageModel,
    pipeline: Arc<Pipeline>,
    accounts: Vec<AccountConfig>,
    settings: MonitorSettings,
    list_max_results: u32,
}

impl AccountMonitorFactory {
    pub fn new(
        http_client: HttpClient,
        store: DynStore,
        llm: DynLanguageModel,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            http_client,
            store,
            llm,
            pipeline,
            accounts: cfg.accounts.clone(),
            settings: MonitorSettings::from(&cfg.settings),
            list_max_results: cfg.settings.list_max_results,
        }
    }
}

impl MonitorFactory for AccountMonitorFactory {
    fn build(&self, user_id: &str) -> anyhow::Result<MonitorContext> {
        let account = self
            .accounts
            .iter()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| anyhow!("No account configured for {}", user_id))?;
        let access_token = account
            .access_token()
            .with_context(|| format!("Gmail access token not set in {}", account.token_env))?;

        let mailbox = GmailClient::new(
            self.http_client.clone(),
            access_token,
            account.email_address.clone(),
            self.list_max_results,
        );

        Ok(MonitorContext {
            user_id: account.user_id.clone(),
            store: self.store.clone(),
            mailbox: Arc::new(mailbox),
            llm: self.llm.clone(),
            pipeline: self.pipeline.clone(),
            settings: self.settings,
        })
    }
}
