//! Transfer Error Types
//!
//! One error enum shared by registration, transfer acceptance, listing and
//! settlement. Each variant maps to a stable string code and an HTTP status.

use thiserror::Error;

use crate::money::MoneyError;

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Auth ===
    #[error("Not authenticated")]
    NotAuthenticated,

    // === Lookup ===
    #[error("{0} not found")]
    NotFound(String),

    // === Balance ===
    #[error("Insufficient balance")]
    InsufficientFunds,

    // === Validation ===
    #[error("{0}")]
    ValidationFailure(String),

    #[error("Unsupported currency pair: {from} -> {to}")]
    UnsupportedCurrencyPair { from: String, to: String },

    #[error("{0}")]
    Conflict(String),

    // === Settlement ===
    #[error("Settlement failed: {0}")]
    SettlementFailure(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // === System ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::NotAuthenticated => "NOT_AUTHENTICATED",
            TransferError::NotFound(_) => "NOT_FOUND",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::ValidationFailure(_) => "VALIDATION_FAILURE",
            TransferError::UnsupportedCurrencyPair { .. } => "UNSUPPORTED_CURRENCY_PAIR",
            TransferError::Conflict(_) => "CONFLICT",
            TransferError::SettlementFailure(_) => "SETTLEMENT_FAILURE",
            TransferError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            TransferError::Database(_) => "DATABASE_ERROR",
            TransferError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::NotAuthenticated => 401,
            TransferError::NotFound(_) => 404,
            TransferError::ValidationFailure(_) | TransferError::UnsupportedCurrencyPair { .. } => {
                400
            }
            TransferError::Conflict(_) => 409,
            TransferError::InsufficientFunds => 422,
            TransferError::SettlementFailure(_)
            | TransferError::InvalidStateTransition(_)
            | TransferError::Database(_)
            | TransferError::Internal(_) => 500,
        }
    }

    /// Whether the message may be shown to API clients verbatim
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TransferError::ValidationFailure(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        TransferError::NotFound(what.into())
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Database(e.to_string())
    }
}

impl From<MoneyError> for TransferError {
    fn from(e: MoneyError) -> Self {
        TransferError::ValidationFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(TransferError::NotAuthenticated.code(), "NOT_AUTHENTICATED");
        assert_eq!(TransferError::not_found("Receiver").code(), "NOT_FOUND");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::NotAuthenticated.http_status(), 401);
        assert_eq!(TransferError::validation("bad").http_status(), 400);
        assert_eq!(TransferError::not_found("User").http_status(), 404);
        assert_eq!(TransferError::Conflict("dup".into()).http_status(), 409);
        assert_eq!(TransferError::InsufficientFunds.http_status(), 422);
        assert_eq!(TransferError::Internal("x".into()).http_status(), 500);
        assert!(!TransferError::Database("x".into()).is_client_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TransferError::InsufficientFunds.to_string(),
            "Insufficient balance"
        );
        assert_eq!(
            TransferError::not_found("Receiver").to_string(),
            "Receiver not found"
        );
        assert_eq!(TransferError::NotAuthenticated.to_string(), "Not authenticated");
    }

    #[test]
    fn test_money_error_is_validation() {
        let err: TransferError = MoneyError::InvalidAmount.into();
        assert_eq!(
            err,
            TransferError::ValidationFailure("Amount must be positive".into())
        );
    }
}
