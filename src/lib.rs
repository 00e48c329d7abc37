//! RemitFlow - Cross-Border P2P Transfers
//!
//! Users hold balances in USD, EUR, GBP and JPY and send money to each other
//! across currencies. A transfer is accepted synchronously (funds reserved,
//! record INITIATED) and settled by background workers after a short delay.
//!
//! # Modules
//!
//! - [`money`] - Currencies and strict amount parsing
//! - [`fx`] - Fixed exchange rates, fee and quotes
//! - [`account`] - Users, wallets and starting balances
//! - [`store`] - `LedgerStore` seam (PostgreSQL and in-memory)
//! - [`transfer`] - Transfer lifecycle, settlement and workers
//! - [`user_auth`] - Registration, login and JWT middleware
//! - [`gateway`] - HTTP API (axum) and OpenAPI docs
//! - [`db`] - Connection pool and schema

pub mod account;
pub mod config;
pub mod db;
pub mod fx;
pub mod gateway;
pub mod logging;
pub mod money;
pub mod store;
pub mod transfer;
pub mod user_auth;

// Convenient re-exports at crate root
pub use money::Currency;
pub use store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
pub use transfer::{TransactionStatus, TransferError, TransferService};
