//! Account management module
//!
//! User records, balances and wallet placeholders.

pub mod models;
pub mod wallet;

// Re-export commonly used types
pub use models::{Balance, DirectoryEntry, NewUser, User, UserProfile, UserWithBalances};
pub use wallet::{Wallet, seed_balances};
