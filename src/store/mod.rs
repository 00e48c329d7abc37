//! Ledger Store
//!
//! Persistence seam for users, balances, transactions and settlement jobs.
//!
//! Every multi-row mutation is atomic: either all of its effects are visible
//! or none are.
//!
//! | Operation          | Effects (one unit)                                             |
//! |--------------------|----------------------------------------------------------------|
//! | `insert_user`      | user row + seeded balance rows                                 |
//! | `accept_transfer`  | conditional sender debit + INITIATED record + settlement job   |
//! | `settle`           | receiver credit + INITIATED→SETTLED + job removal              |
//! | `fail_and_refund`  | sender refund + INITIATED→FAILED + job removal                 |

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::account::{Balance, NewUser, User};
use crate::money::Currency;
use crate::transfer::error::TransferError;
use crate::transfer::types::{
    NewTransaction, SettleOutcome, SettlementJob, TransactionId, TransactionRecord,
    TransactionView,
};

/// Storage backend for the ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Liveness check
    async fn ping(&self) -> Result<(), TransferError>;

    // === Users ===

    /// Insert a user together with its starting balances
    ///
    /// Returns `Conflict` if the email is already registered.
    async fn insert_user(&self, user: NewUser, balances: &[Balance])
    -> Result<User, TransferError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, TransferError>;

    /// Lookup by (already normalized) email
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, TransferError>;

    /// All users except `exclude_user_id`, sorted by name
    async fn list_other_users(&self, exclude_user_id: i64) -> Result<Vec<User>, TransferError>;

    // === Balances ===

    /// All balances of a user, ordered by currency code
    async fn get_balances(&self, user_id: i64) -> Result<Vec<Balance>, TransferError>;

    async fn get_balance(
        &self,
        user_id: i64,
        currency: Currency,
    ) -> Result<Option<Decimal>, TransferError>;

    // === Transactions ===

    /// Accept a transfer
    ///
    /// Debits `amount + fee` from the sender only if the balance covers it,
    /// inserts the INITIATED record and enqueues its settlement job due at
    /// `run_at`. Returns `InsufficientFunds` with nothing written otherwise.
    async fn accept_transfer(
        &self,
        tx: NewTransaction,
        run_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, TransferError>;

    async fn get_transaction(
        &self,
        tx_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, TransferError>;

    /// Sent and received transactions of a user
    ///
    /// Sorted by `created_at` descending, then `id` descending.
    async fn list_user_transactions(
        &self,
        user_id: i64,
    ) -> Result<Vec<TransactionView>, TransferError>;

    // === Settlement jobs ===

    /// Claim up to `limit` due jobs for `worker`
    ///
    /// A job is claimable when `run_at <= now` and it is unclaimed or its
    /// claim is older than `lease`. Claims are exclusive.
    async fn claim_due_jobs(
        &self,
        worker: &str,
        now: DateTime<Utc>,
        lease: Duration,
        limit: usize,
    ) -> Result<Vec<SettlementJob>, TransferError>;

    /// Credit the receiver, mark SETTLED with `block_height` and drop the job
    async fn settle(
        &self,
        tx_id: &TransactionId,
        block_height: i64,
    ) -> Result<SettleOutcome, TransferError>;

    /// Refund the sender, mark FAILED and drop the job
    async fn fail_and_refund(
        &self,
        tx_id: &TransactionId,
        reason: &str,
    ) -> Result<SettleOutcome, TransferError>;

    /// Number of settlement jobs not yet completed
    async fn pending_job_count(&self) -> Result<usize, TransferError>;
}

/// Lease expiry check shared by both backends
pub(crate) fn lease_expired(
    claimed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lease: Duration,
) -> bool {
    match claimed_at {
        None => true,
        Some(at) => {
            let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
            at.checked_add_signed(lease).is_some_and(|expiry| expiry <= now)
        }
    }
}
