//! Cross-border Transfers
//!
//! A transfer is accepted synchronously and settled later by a worker.
//!
//! # Lifecycle
//!
//! ```text
//! create_transaction ──▶ INITIATED ──(delay)──▶ settle ──▶ SETTLED
//!   debit amount+fee        │                     │
//!   enqueue job             │                     └─(error)─▶ refund ──▶ FAILED
//! ```
//!
//! # Invariants
//!
//! 1. **Atomic reservation**: the sender debit, the INITIATED record and the
//!    settlement job are written together or not at all
//! 2. **Non-negative balances**: the debit is conditional on `balance >= amount + fee`
//! 3. **Exactly-once finalization**: status leaves INITIATED once, via CAS
//! 4. **No retry**: a failed settlement refunds the sender and stays FAILED

pub mod cache;
pub mod error;
pub mod service;
pub mod settlement;
pub mod state;
pub mod types;
pub mod worker;

// Re-exports for convenience
pub use cache::TransactionViewCache;
pub use error::TransferError;
pub use service::TransferService;
pub use settlement::Settler;
pub use state::TransactionStatus;
pub use types::{
    CreateTransactionRequest, Direction, SettleOutcome, TransactionId, TransactionRecord,
    TransactionView,
};
pub use worker::{SettlementWorker, WorkerConfig, spawn_pool};
