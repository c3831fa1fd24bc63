//! Error handling for the Warehouse Stock Ledger
//!
//! Stock-engine failures are typed so the embedding controller layer can
//! distinguish integrity errors from insufficient-stock rejections and
//! concurrent conflicts; user messaging is the caller's concern.

use rust_decimal::Decimal;
use thiserror::Error;

use shared::ledger::LedgerRuleViolation;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// An event referenced a dimension or aggregate row that must exist.
    /// This indicates referential corruption and aborts the transaction.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// A request would consume more stock than is on hand. Reported before
    /// any mutation, with the amounts so callers can show the shortage.
    #[error("Insufficient stock: required {required}, available {available}")]
    InsufficientStock {
        required: Decimal,
        available: Decimal,
    },

    /// A concurrent event consumed stock between the pre-check and this
    /// transaction's guarded update; committing would drive an aggregate
    /// negative.
    #[error("Stock conflict: {0}")]
    StockConflict(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field validation failure.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Shortage carried by an insufficient-stock rejection, if any.
    pub fn shortage(&self) -> Option<Decimal> {
        match self {
            AppError::InsufficientStock {
                required,
                available,
            } => Some(shared::ledger::shortage(*required, *available)),
            _ => None,
        }
    }
}

impl From<LedgerRuleViolation> for AppError {
    fn from(violation: LedgerRuleViolation) -> Self {
        AppError::Validation {
            field: "weight_override".to_string(),
            message: violation.to_string(),
        }
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;
