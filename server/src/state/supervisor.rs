use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering::Relaxed},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use derive_more::derive::Display;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::monitor::{run_monitor, MonitorContext, MonitorStats, MonitorStatsSnapshot};

/// Builds the monitoring context for a user, or fails if the user cannot be monitored.
pub trait MonitorFactory: Send + Sync {
    fn build(&self, user_id: &str) -> anyhow::Result<MonitorContext>;
}

#[derive(Debug, Display)]
pub enum StartError {
    /// The previous loop was cancelled but is still finishing a message
    #[display("Monitoring for {_0} is still stopping")]
    Stopping(String),
    #[display("{_0}")]
    Unavailable(anyhow::Error),
}

impl std::error::Error for StartError {}

/// A loop stays registered until its task ends, including after it was asked to stop.
struct MonitorHandle {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
    stats: Arc<MonitorStats>,
    started_at: DateTime<Utc>,
}

impl MonitorHandle {
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    fn is_active(&self) -> bool {
        self.is_running() && !self.token.is_cancelled()
    }

    fn is_stopping(&self) -> bool {
        self.is_running() && self.token.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub user_id: String,
    pub active: bool,
    pub stopping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MonitorStatsSnapshot>,
}

type MonitorMap = HashMap<String, MonitorHandle>;

/// Owns the set of running monitoring loops, at most one per user.
#[derive(Clone)]
pub struct MonitorSupervisor {
    factory: Arc<dyn MonitorFactory>,
    monitors: Arc<RwLock<MonitorMap>>,
    generations: Arc<AtomicU64>,
}

impl MonitorSupervisor {
    pub fn new(factory: Arc<dyn MonitorFactory>) -> Self {
        Self {
            factory,
            monitors: Arc::new(RwLock::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts monitoring. Returns `false` if the user is already being monitored, and
    /// [`StartError::Stopping`] while a stopped loop is still finishing its current message.
    pub fn start(&self, user_id: &str) -> Result<bool, StartError> {
        let mut monitors = self.monitors.write().unwrap_or_else(PoisonError::into_inner);
        match monitors.get(user_id) {
            Some(handle) if handle.is_active() => {
                tracing::info!("Monitoring for {} already running", user_id);
                return Ok(false);
            }
            Some(handle) if handle.is_stopping() => {
                tracing::warn!("Refusing to start {} before its last loop ends", user_id);
                return Err(StartError::Stopping(user_id.to_string()));
            }
            _ => {}
        }

        let ctx = self
            .factory
            .build(user_id)
            .map_err(StartError::Unavailable)?;
        let generation = self.generations.fetch_add(1, Relaxed);
        let token = CancellationToken::new();
        let stats = Arc::new(MonitorStats::default());

        let task = {
            let token = token.clone();
            let stats = stats.clone();
            let monitors = self.monitors.clone();
            let user_id = user_id.to_string();
            tokio::spawn(async move {
                let exit = run_monitor(ctx, stats, token).await;
                tracing::info!("Monitoring for {} stopped: {}", user_id, exit);

                let mut monitors = monitors.write().unwrap_or_else(PoisonError::into_inner);
                if monitors
                    .get(&user_id)
                    .is_some_and(|handle| handle.generation == generation)
                {
                    monitors.remove(&user_id);
                }
            })
        };

        monitors.insert(
            user_id.to_string(),
            MonitorHandle {
                generation,
                token,
                task,
                stats,
                started_at: Utc::now(),
            },
        );

        Ok(true)
    }

    /// Requests a stop. A message already being processed is allowed to finish, and the loop
    /// keeps its slot until it does.
    pub fn stop(&self, user_id: &str) -> bool {
        let monitors = self.monitors.read().unwrap_or_else(PoisonError::into_inner);
        match monitors.get(user_id) {
            Some(handle) if handle.is_active() => {
                tracing::info!("Stopping monitoring for {}", user_id);
                handle.token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, user_id: &str) -> bool {
        self.monitors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .is_some_and(MonitorHandle::is_active)
    }

    pub fn status(&self, user_id: &str) -> MonitorStatus {
        let monitors = self.monitors.read().unwrap_or_else(PoisonError::into_inner);
        match monitors.get(user_id) {
            Some(handle) => MonitorStatus {
                user_id: user_id.to_string(),
                active: handle.is_active(),
                stopping: handle.is_stopping(),
                started_at: Some(handle.started_at),
                stats: Some(handle.stats.snapshot()),
            },
            None => MonitorStatus {
                user_id: user_id.to_string(),
                active: false,
                stopping: false,
                started_at: None,
                stats: None,
            },
        }
    }

    pub fn active_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .monitors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, handle)| handle.is_active())
            .map(|(user_id, _)| user_id.clone())
            .collect();
        users.sort();
        users
    }

    /// Cancels every loop and hands back their tasks so the caller can wait for them.
    pub fn stop_all(&self) -> Vec<JoinHandle<()>> {
        let monitors: Vec<(String, MonitorHandle)> = self
            .monitors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        monitors
            .into_iter()
            .map(|(user_id, handle)| {
                tracing::info!("Stopping monitoring for {}", user_id);
                handle.token.cancel();
                handle.task
            })
            .collect()
    }

    /// Stops every loop and waits up to `grace` for in-flight messages to finish.
    /// Returns `false` if some loop was still running when the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let tasks = self.stop_all();
        if tasks.is_empty() {
            return true;
        }

        tracing::info!(
            "Waiting up to {:?} for {} monitoring loops to finish",
            grace,
            tasks.len()
        );
        match tokio::time::timeout(grace, futures::future::join_all(tasks)).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!("Monitoring loops still running after {:?}", grace);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use lib_inbox::Pipeline;

    use super::*;
    use crate::{
        state::monitor::MonitorSettings,
        store::MemoryStore,
        testing::common::{incoming, FakeLanguageModel, FakeMailbox, CUSTOMER_BODY},
    };

    struct TestFactory {
        store: Arc<MemoryStore>,
        mailbox: Arc<FakeMailbox>,
        llm: Arc<FakeLanguageModel>,
    }

    impl MonitorFactory for TestFactory {
        fn build(&self, user_id: &str) -> anyhow::Result<MonitorContext> {
            if user_id == "nobody" {
                return Err(anyhow!("No account configured for {}", user_id));
            }
            Ok(MonitorContext {
                user_id: user_id.to_string(),
                store: self.store.clone(),
                mailbox: self.mailbox.clone(),
                llm: self.llm.clone(),
                pipeline: Arc::new(Pipeline::default()),
                settings: MonitorSettings::default(),
            })
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        mailbox: Arc<FakeMailbox>,
        llm: Arc<FakeLanguageModel>,
        supervisor: MonitorSupervisor,
    }

    fn fixture(llm: FakeLanguageModel) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mailbox = Arc::new(FakeMailbox::default());
        let llm = Arc::new(llm);
        let supervisor = MonitorSupervisor::new(Arc::new(TestFactory {
            store: store.clone(),
            mailbox: mailbox.clone(),
            llm: llm.clone(),
        }));
        Fixture {
            store,
            mailbox,
            llm,
            supervisor,
        }
    }

    /// One customer message whose reply takes five seconds to generate.
    fn slow_fixture() -> Fixture {
        let f = fixture(FakeLanguageModel::replying("ok").slow(Duration::from_secs(5)));
        f.mailbox
            .push(incoming("m1", "jordan@example.org", "Chairs", CUSTOMER_BODY));
        f
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_stop_deactivates() {
        let supervisor = fixture(FakeLanguageModel::replying("ok")).supervisor;

        assert!(supervisor.start("u1").unwrap());
        assert!(!supervisor.start("u1").unwrap());
        assert!(supervisor.is_active("u1"));
        assert_eq!(supervisor.active_users(), vec!["u1".to_string()]);

        assert!(supervisor.stop("u1"));
        assert!(!supervisor.is_active("u1"));
        assert!(!supervisor.stop("u1"));
    }

    #[tokio::test]
    async fn test_unknown_user_cannot_start() {
        let supervisor = fixture(FakeLanguageModel::replying("ok")).supervisor;

        assert!(matches!(
            supervisor.start("nobody"),
            Err(StartError::Unavailable(_))
        ));
        assert!(!supervisor.is_active("nobody"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_monitor_deregisters_and_can_restart() {
        let f = fixture(FakeLanguageModel::replying("ok"));
        f.mailbox.fail_listing();
        let supervisor = f.supervisor;

        assert!(supervisor.start("u1").unwrap());
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert!(!supervisor.is_active("u1"));
        assert!(supervisor.active_users().is_empty());
        assert_eq!(supervisor.status("u1").stats, None);

        assert!(supervisor.start("u1").unwrap());
        assert!(supervisor.is_active("u1"));
        supervisor.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_iterations() {
        let supervisor = fixture(FakeLanguageModel::replying("ok")).supervisor;
        supervisor.start("u1").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = supervisor.status("u1");
        assert!(status.active);
        assert!(!status.stopping);
        assert_eq!(status.stats.unwrap().iterations, 1);
        supervisor.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_stopping_loop() {
        let f = slow_fixture();

        assert!(f.supervisor.start("u1").unwrap());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(f.supervisor.stop("u1"));

        assert!(matches!(
            f.supervisor.start("u1"),
            Err(StartError::Stopping(_))
        ));
        let status = f.supervisor.status("u1");
        assert!(!status.active);
        assert!(status.stopping);
        assert!(f.supervisor.active_users().is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(f.store.drafts("u1").len(), 1);
        assert!(!f.supervisor.status("u1").stopping);

        assert!(f.supervisor.start("u1").unwrap());
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(f.store.drafts("u1").len(), 1);
        assert_eq!(f.mailbox.drafts().len(), 1);
        assert_eq!(f.llm.calls(), 1);
        f.supervisor.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_message_finish() {
        let f = slow_fixture();

        assert!(f.supervisor.start("u1").unwrap());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.llm.calls(), 1);
        assert!(f.store.drafts("u1").is_empty());

        assert!(f.supervisor.shutdown(Duration::from_secs(30)).await);

        let drafts = f.store.drafts("u1");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].gmail_draft_id.as_deref(), Some("draft-thread-m1"));
        assert!(f.supervisor.active_users().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_after_grace_period() {
        let f = fixture(FakeLanguageModel::replying("ok").slow(Duration::from_secs(120)));
        f.mailbox
            .push(incoming("m1", "jordan@example.org", "Chairs", CUSTOMER_BODY));

        f.supervisor.start("u1").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!f.supervisor.shutdown(Duration::from_secs(10)).await);
        assert!(f.store.drafts("u1").is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_without_loops_returns_immediately() {
        let supervisor = fixture(FakeLanguageModel::replying("ok")).supervisor;
        assert!(supervisor.shutdown(Duration::from_secs(30)).await);
    }
}
