//! Error types for CoreBank operations.

use crate::{AccountIdentifier, AccountRef, Currency, Money, PostingId};
use thiserror::Error;

/// Main error type for CoreBank operations.
///
/// Every variant is an expected, caller-visible business failure reported
/// synchronously; the engines never retry. Invariant violations (such as a
/// missing category account after directory validation) panic instead.
#[derive(Error, Debug)]
pub enum BankError {
    /// Account is not configured.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountRef),

    /// Available balance does not cover the requested amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// Unsupported currency or currency pair.
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// Quote is unknown, expired, mismatched, or already redeemed.
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    /// Account scheme other than BIC + account number.
    #[error("Unsupported account type: {0}")]
    UnsupportedAccountType(AccountIdentifier),

    /// Transfer was sourced from the configured reject account.
    #[error("Rejected by simulation, posting {posting_id} canceled")]
    RejectedBySimulation { posting_id: PostingId },

    /// Referenced posting does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(PostingId),

    /// Commit/rollback request does not match the hold record.
    #[error("Hold mismatch on {field}: expected {expected}, got {actual}")]
    HoldMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// Invalid posting or leg state transition.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Amount string could not be parsed as a decimal.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BankError {
    /// Get the wire error code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            BankError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            BankError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            BankError::InvalidCurrency(_) => "INVALID_CURRENCY",
            BankError::InvalidQuote(_) => "INVALID_QUOTE",
            BankError::UnsupportedAccountType(_) => "UNSUPPORTED_ACCOUNT_TYPE",
            BankError::RejectedBySimulation { .. } => "REJECTED_BY_SIMULATION",
            BankError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            BankError::HoldMismatch { .. } => "HOLD_MISMATCH",
            BankError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BankError::InvalidAmount(_) => "INVALID_AMOUNT",
            BankError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Build the currency-mismatch form of [`BankError::InvalidCurrency`].
    pub fn currency_mismatch(expected: &Currency, actual: &Currency) -> Self {
        BankError::InvalidCurrency(format!("expected {}, got {}", expected, actual))
    }
}

/// Result type alias for CoreBank operations.
pub type Result<T> = std::result::Result<T, BankError>;
