//! Settlement Worker
//!
//! Background workers that claim due settlement jobs and complete them.
//! Jobs live in the store, so pending settlements survive a restart: the
//! first scan after startup picks up everything that came due meanwhile.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::error::TransferError;
use super::settlement::Settler;
use super::types::SettleOutcome;
use crate::store::LedgerStore;

/// Configuration for settlement workers
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between scans when no job was due
    pub poll_interval: Duration,
    /// How long a claim is held before another worker may take the job
    pub lease: Duration,
    /// Maximum jobs claimed per scan
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            lease: Duration::from_secs(30),
            batch_size: 50,
        }
    }
}

/// Settlement Worker
pub struct SettlementWorker {
    name: String,
    store: Arc<dyn LedgerStore>,
    settler: Arc<Settler>,
    config: WorkerConfig,
}

impl SettlementWorker {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn LedgerStore>,
        settler: Arc<Settler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            settler,
            config,
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker = %self.name,
            store = self.store.name(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            lease_secs = self.config.lease.as_secs(),
            batch_size = self.config.batch_size,
            "Starting settlement worker"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let processed = match self.run_once().await {
                Ok(n) => n,
                Err(e) => {
                    error!(worker = %self.name, error = %e, "Settlement scan failed");
                    0
                }
            };

            // A full batch likely means more work is due; scan again right away
            if processed >= self.config.batch_size {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker = %self.name, "Settlement worker stopped");
    }

    /// Claim and process one batch of due jobs; returns how many were claimed
    pub async fn run_once(&self) -> Result<usize, TransferError> {
        let jobs = self
            .store
            .claim_due_jobs(
                &self.name,
                Utc::now(),
                self.config.lease,
                self.config.batch_size,
            )
            .await?;

        if jobs.is_empty() {
            return Ok(0);
        }

        debug!(worker = %self.name, count = jobs.len(), "Claimed settlement jobs");

        let mut settled = 0;
        let mut failed = 0;
        for job in &jobs {
            match self.settler.settle(job).await {
                Ok(SettleOutcome::Applied(record)) if record.block_height.is_some() => settled += 1,
                Ok(SettleOutcome::Applied(_)) => failed += 1,
                Ok(SettleOutcome::Skipped(_)) => {}
                Err(e) => {
                    error!(worker = %self.name, tx_id = %job.tx_id, error = %e, "Settlement job left claimed");
                }
            }
        }

        if settled + failed > 0 {
            info!(worker = %self.name, settled, failed, "Settlement batch done");
        }

        Ok(jobs.len())
    }
}

/// Spawn `count` workers sharing one store and settler
pub fn spawn_pool(
    count: usize,
    store: Arc<dyn LedgerStore>,
    settler: Arc<Settler>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..count.max(1))
        .map(|i| {
            let worker = SettlementWorker::new(
                format!("settler-{i}"),
                store.clone(),
                settler.clone(),
                config.clone(),
            );
            let rx = shutdown.clone();
            tokio::spawn(async move { worker.run(rx).await })
        })
        .collect()
}
