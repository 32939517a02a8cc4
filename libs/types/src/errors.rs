//! Error types shared by the exchange crates
//!
//! Ledger, partitioning and configuration errors live next to the code that
//! raises them; this module only holds the errors of the shared domain types.

use thiserror::Error;

/// Invalid numeric input for prices and quantities
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("Invalid decimal: {0}")]
    Parse(String),

    #[error("Price must be positive: {0}")]
    NonPositivePrice(String),

    #[error("Quantity must not be negative: {0}")]
    NegativeQuantity(String),
}

/// Order-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Order already in terminal state: {status}")]
    AlreadyTerminal { status: String },

    #[error("Fill of {fill} exceeds unmatched amount {unmatched}")]
    Overfill { fill: String, unmatched: String },

    #[error(transparent)]
    Numeric(#[from] NumericError),
}
