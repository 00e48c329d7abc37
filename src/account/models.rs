//! Data models for user accounts and balances

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::money::Currency;

/// User account
///
/// Wallet fields are generated once at registration and never rotated.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub country: String,
    pub wallet_address: String,
    pub public_key: String,
    #[serde(skip_serializing)]
    pub private_key: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            country: self.country.clone(),
            wallet_address: self.wallet_address.clone(),
            public_key: self.public_key.clone(),
            created_at: self.created_at,
        }
    }

    pub fn directory_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            user_id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            country: self.country.clone(),
            wallet_address: self.wallet_address.clone(),
        }
    }
}

/// User fields ready for insertion; the store assigns `user_id`
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub country: String,
    pub wallet_address: String,
    pub public_key: String,
    pub private_key: String,
}

/// Public view of a user (never carries key material beyond the public key)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserProfile {
    pub user_id: i64,
    #[schema(example = "Alice")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "DE")]
    pub country: String,
    pub wallet_address: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

/// Entry of the user directory shown to other users
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DirectoryEntry {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub country: String,
    pub wallet_address: String,
}

/// Balance row: one per (user, currency)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Balance {
    pub currency: Currency,
    #[schema(value_type = String, example = "7321.55")]
    pub amount: Decimal,
}

impl Balance {
    pub fn new(currency: Currency, amount: Decimal) -> Self {
        Self { currency, amount }
    }
}

/// Profile with current balances
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserWithBalances {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub balances: Vec<Balance>,
}
