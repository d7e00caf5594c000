mod email;
mod error;
mod prompt;
mod rate_limiters;
mod routes;
mod server_config;
mod state;
mod store;
#[cfg(test)]
mod testing;

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use axum::extract::FromRef;
use lib_inbox::Pipeline;
use mimalloc::MiMalloc;
use prompt::{DynLanguageModel, OpenAiClient};
use rate_limiters::RateLimiters;
use routes::AppRouter;
use server_config::{cfg, StoreKind};
use state::{AccountMonitorFactory, MonitorSupervisor};
use store::{DynStore, MemoryStore, SupabaseStore};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    http_client: HttpClient,
    store: DynStore,
    rate_limiters: RateLimiters,
    pipeline: Arc<Pipeline>,
    supervisor: MonitorSupervisor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    println!("{}", *cfg);

    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;
    let rate_limiters = RateLimiters::from_config();

    let store: DynStore = match cfg.store.kind {
        StoreKind::Memory => Arc::new(MemoryStore::from_accounts(&cfg.accounts)?),
        StoreKind::Supabase => Arc::new(SupabaseStore::from_env()?),
    };
    tracing::info!("Using {} store", cfg.store.kind);

    let llm: DynLanguageModel = Arc::new(OpenAiClient::from_config(
        http_client.clone(),
        rate_limiters.clone(),
    ));
    let pipeline = Arc::new(Pipeline::new(cfg.scoring.clone()));

    let supervisor = MonitorSupervisor::new(Arc::new(AccountMonitorFactory::new(
        http_client.clone(),
        store.clone(),
        llm,
        pipeline.clone(),
    )));

    for account in cfg.accounts.iter().filter(|a| a.monitor_on_startup) {
        match supervisor.start(&account.user_id) {
            Ok(_) => tracing::info!("Monitoring {} on startup", account.email_address),
            Err(e) => tracing::error!(
                "Could not start monitoring for {}: {:?}",
                account.user_id,
                e
            ),
        }
    }

    let state = ServerState {
        http_client,
        store,
        rate_limiters,
        pipeline,
        supervisor: supervisor.clone(),
    };
    let router = AppRouter::create(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(cfg.settings.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let grace = Duration::from_secs(cfg.settings.shutdown_grace_secs);
    if !supervisor.shutdown(grace).await {
        tracing::warn!("Abandoning monitoring loops that did not finish in time");
    }
    tracing::info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
