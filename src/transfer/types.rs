//! Transfer Core Types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::state::TransactionStatus;
use crate::money::{Currency, StrictDecimal};

const TX_ID_PREFIX: &str = "tx_";

/// Transaction ID - `tx_` followed by a ULID
///
/// Time-ordered and collision-resistant without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    /// Generate a new unique TransactionId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TX_ID_PREFIX, self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(TX_ID_PREFIX).unwrap_or(s);
        Ok(Self(ulid::Ulid::from_string(raw)?))
    }
}

impl Serialize for TransactionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transfer request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    #[serde(alias = "receiverEmail")]
    #[schema(example = "bob@example.com")]
    pub receiver_email: String,
    #[schema(value_type = String, example = "50.00")]
    pub amount: StrictDecimal,
    #[serde(alias = "sourceCurrency")]
    #[schema(example = "USD")]
    pub source_currency: String,
    #[serde(alias = "targetCurrency")]
    #[schema(example = "EUR")]
    pub target_currency: String,
}

/// A transaction ready to be accepted, before the store assigns a row id
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub tx_id: TransactionId,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub amount: Decimal,
    pub source_currency: Currency,
    pub target_currency: Currency,
    pub exchange_rate: Decimal,
    pub settled_amount: Decimal,
    pub fee: Decimal,
    pub gas_used: Decimal,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Amount reserved from the sender at acceptance and returned on failure
    pub fn total_debit(&self) -> Decimal {
        self.amount + self.fee
    }

    pub fn into_record(self, id: i64) -> TransactionRecord {
        TransactionRecord {
            id,
            tx_id: self.tx_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            amount: self.amount,
            source_currency: self.source_currency,
            target_currency: self.target_currency,
            status: TransactionStatus::Initiated,
            exchange_rate: self.exchange_rate,
            settled_amount: self.settled_amount,
            fee: self.fee,
            gas_used: self.gas_used,
            signature: self.signature,
            block_height: None,
            failure_reason: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Persisted transaction record
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionRecord {
    pub id: i64,
    #[schema(value_type = String, example = "tx_01J9ZQ4K3T8X2M5N7P9R1S3V5W")]
    pub tx_id: TransactionId,
    pub sender_id: i64,
    pub receiver_id: i64,
    #[schema(value_type = String, example = "50.00")]
    pub amount: Decimal,
    pub source_currency: Currency,
    pub target_currency: Currency,
    pub status: TransactionStatus,
    #[schema(value_type = String, example = "0.85")]
    pub exchange_rate: Decimal,
    #[schema(value_type = String, example = "42.50")]
    pub settled_amount: Decimal,
    #[schema(value_type = String, example = "0.05")]
    pub fee: Decimal,
    #[schema(value_type = String, example = "10.0")]
    pub gas_used: Decimal,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn total_debit(&self) -> Decimal {
        self.amount + self.fee
    }

    /// Whether `user_id` is the sender or the receiver
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

/// Direction of a transaction relative to the viewing user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// The other party of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Counterparty {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

/// A transaction as seen by one of its parties
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionView {
    pub direction: Direction,
    pub counterparty: Counterparty,
    #[serde(flatten)]
    pub record: TransactionRecord,
}

/// Durable settlement job, one per INITIATED transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementJob {
    pub tx_id: TransactionId,
    pub run_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
}

/// Result of applying a settlement to a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Status moved out of INITIATED; carries the updated record
    Applied(TransactionRecord),
    /// Transaction was already terminal; nothing changed
    Skipped(TransactionStatus),
}
