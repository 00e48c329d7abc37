//! RemitFlow server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Config  │───▶│  Store   │───▶│   Gateway    │───▶│  INITIATED   │
//! │  (YAML)  │    │ (PG/mem) │    │ (axum, JWT)  │    │ + job queued │
//! └──────────┘    └──────────┘    └──────────────┘    └──────┬───────┘
//!                                                            │
//!                                 ┌──────────────┐           │
//!                                 │ Settlement   │◀──────────┘
//!                                 │ worker pool  │──▶ SETTLED / FAILED
//!                                 └──────────────┘
//! ```
//!
//! Usage: `remitflow [--env dev] [--port 8080]`

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use remitflow::config::AppConfig;
use remitflow::db::Database;
use remitflow::gateway::{self, state::AppState};
use remitflow::logging::init_logging;
use remitflow::store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use remitflow::transfer::{Settler, TransactionViewCache, TransferService, spawn_pool};
use remitflow::user_auth::UserAuthService;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            db.init_schema().await.context("failed to initialize schema")?;
            Ok(Arc::new(PgLedgerStore::new(db.pool().clone())))
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-memory store (data is lost on exit)");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }

    let _guard = init_logging(&config);
    tracing::info!(env = %env, "Starting RemitFlow");

    let store = open_store(&config).await?;

    let cache = Arc::new(TransactionViewCache::new(config.cache.ttl_secs));
    let transfers = Arc::new(TransferService::new(
        store.clone(),
        cache.clone(),
        config.settlement.delay(),
    ));
    let user_auth = Arc::new(UserAuthService::new(store.clone(), config.jwt_secret.clone()));
    let settler = Arc::new(Settler::new(store.clone(), cache));

    // Settlement workers pick up jobs left over from a previous run on their first scan
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = spawn_pool(
        config.settlement.workers,
        store.clone(),
        settler,
        config.settlement.to_worker_config(),
        shutdown_rx,
    );
    tracing::info!(
        workers = workers.len(),
        delay_ms = config.settlement.delay_ms,
        "Settlement workers started"
    );

    let state = Arc::new(AppState::new(store, user_auth, transfers));
    let served = gateway::run_server(
        &config.gateway.host,
        config.gateway.port,
        state,
        shutdown_signal(),
    )
    .await;

    let _ = shutdown_tx.send(true);
    for handle in workers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Settlement worker panicked");
        }
    }

    served
}
