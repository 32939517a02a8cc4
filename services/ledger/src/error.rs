//! Ledger error taxonomy

use rust_decimal::Decimal;
use thiserror::Error;
use types::ids::WalletId;
use types::wallet::Reference;

/// Errors raised by the ledger write path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient balance in wallet {wallet_id}: balance {balance}, delta {delta}")]
    InsufficientBalance {
        wallet_id: WalletId,
        balance: Decimal,
        delta: Decimal,
    },

    #[error("reference already committed: {0}")]
    DuplicateReference(Reference),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("wallet {0} is inactive")]
    InactiveWallet(WalletId),

    #[error("writer for wallet {expected} received a row for wallet {actual}")]
    WalletMismatch { expected: WalletId, actual: WalletId },

    #[error("storage failure: {0}")]
    Storage(String),

    /// The caller's commit hook failed; nothing was applied
    #[error("commit aborted: {0}")]
    Aborted(String),
}

impl LedgerError {
    /// A replayed reference: the postings already exist, nothing was applied
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::DuplicateReference(_))
    }
}
