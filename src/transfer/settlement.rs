//! Settlement
//!
//! Completes one due transfer. The happy path credits the receiver, marks
//! the record SETTLED with a simulated block height and drops the job, all in
//! one store unit. If that unit fails, a second unit refunds the sender and
//! marks the record FAILED. A failed settlement is never retried.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::cache::TransactionViewCache;
use super::error::TransferError;
use super::types::{SettleOutcome, SettlementJob};
use crate::store::LedgerStore;

/// Exclusive upper bound of the simulated block height
pub const MAX_BLOCK_HEIGHT: i64 = 1_000_000;

pub struct Settler {
    store: Arc<dyn LedgerStore>,
    cache: Arc<TransactionViewCache>,
}

impl Settler {
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<TransactionViewCache>) -> Self {
        Self { store, cache }
    }

    /// Settle one claimed job
    ///
    /// Returns `Err` only when neither settlement nor the failure path could
    /// be recorded; the job then stays claimed until its lease expires.
    pub async fn settle(&self, job: &SettlementJob) -> Result<SettleOutcome, TransferError> {
        let block_height = rand::thread_rng().gen_range(0..MAX_BLOCK_HEIGHT);

        let err = match self.store.settle(&job.tx_id, block_height).await {
            Ok(outcome) => {
                self.after(&outcome).await;
                return Ok(outcome);
            }
            Err(e) => e,
        };

        warn!(
            tx_id = %job.tx_id,
            attempts = job.attempts,
            error = %err,
            "Settlement failed, refunding sender"
        );

        match self.store.fail_and_refund(&job.tx_id, &err.to_string()).await {
            Ok(outcome) => {
                self.after(&outcome).await;
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    tx_id = %job.tx_id,
                    settle_error = %err,
                    refund_error = %e,
                    "CRITICAL: Could not record failed settlement; job will be re-claimed after lease"
                );
                Err(TransferError::SettlementFailure(e.to_string()))
            }
        }
    }

    async fn after(&self, outcome: &SettleOutcome) {
        match outcome {
            SettleOutcome::Applied(record) => {
                self.cache
                    .invalidate(&[record.sender_id, record.receiver_id])
                    .await;
                info!(
                    tx_id = %record.tx_id,
                    status = %record.status,
                    block_height = ?record.block_height,
                    receiver_id = record.receiver_id,
                    settled_amount = %record.settled_amount,
                    target = %record.target_currency,
                    "Transfer finalized"
                );
            }
            SettleOutcome::Skipped(status) => {
                debug!(status = %status, "Transfer already terminal, job dropped");
            }
        }
    }
}
