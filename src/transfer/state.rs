//! Transaction Status Definitions
//!
//! State IDs are stored in PostgreSQL as SMALLINT.
//!
//! ```text
//! INITIATED ──▶ SETTLED
//!     │
//!     └──────▶ FAILED
//! ```
//!
//! `VALIDATED` and `EXECUTED` are part of the status vocabulary shown to
//! clients but no code path transitions into them.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionStatus {
    /// Accepted, sender debited, waiting for settlement
    Initiated = 0,

    /// Reserved, never entered
    Validated = 10,

    /// Reserved, never entered
    Executed = 20,

    /// Terminal: receiver credited, block height assigned
    Settled = 40,

    /// Terminal: settlement failed, sender refunded
    Failed = -10,
}

impl TransactionStatus {
    /// All statuses, in legend order
    pub const ALL: [TransactionStatus; 5] = [
        TransactionStatus::Initiated,
        TransactionStatus::Validated,
        TransactionStatus::Executed,
        TransactionStatus::Settled,
        TransactionStatus::Failed,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Settled | TransactionStatus::Failed)
    }

    /// Whether settlement may move a transaction out of this state
    #[inline]
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Initiated, TransactionStatus::Settled)
                | (TransactionStatus::Initiated, TransactionStatus::Failed)
        )
    }

    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Initiated),
            10 => Some(TransactionStatus::Validated),
            20 => Some(TransactionStatus::Executed),
            40 => Some(TransactionStatus::Settled),
            -10 => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Initiated => "INITIATED",
            TransactionStatus::Validated => "VALIDATED",
            TransactionStatus::Executed => "EXECUTED",
            TransactionStatus::Settled => "SETTLED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// Human description used by the status legend
    pub fn description(&self) -> &'static str {
        match self {
            TransactionStatus::Initiated => "Transfer accepted and awaiting network confirmation",
            TransactionStatus::Validated => "Transfer checks passed",
            TransactionStatus::Executed => "Transfer broadcast to the network",
            TransactionStatus::Settled => "Funds delivered to the receiver",
            TransactionStatus::Failed => "Settlement failed; funds returned to the sender",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the status legend
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusLegendEntry {
    pub status: TransactionStatus,
    pub description: String,
    pub terminal: bool,
}

/// Every declared status with its description
pub fn status_legend() -> Vec<StatusLegendEntry> {
    TransactionStatus::ALL
        .into_iter()
        .map(|status| StatusLegendEntry {
            status,
            description: status.description().to_string(),
            terminal: status.is_terminal(),
        })
        .collect()
}
