//! Storage contract of the ledger
//!
//! A store applies a set of wallet updates as one atomic unit: either every
//! row of every wallet is committed, or nothing is. Callers that keep state
//! outside the ledger join it to the same unit through a commit hook.

use rust_decimal::Decimal;
use serde::Serialize;
use types::ids::{AccountId, WalletId};
use types::wallet::{Reference, Transaction, TransactionType, Wallet};

use crate::error::LedgerError;

/// A buffered, not yet committed ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub tp: TransactionType,
    /// Signed delta, already quantized
    pub amount: Decimal,
    pub description: String,
    pub reference: Reference,
}

/// One wallet's share of an atomic commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletUpdate {
    pub wallet_id: WalletId,
    pub entries: Vec<Entry>,
    /// Skip the non-negative balance condition
    pub allow_negative: bool,
}

impl WalletUpdate {
    /// Net change of the update
    pub fn delta(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

/// Result of applying one [`WalletUpdate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub wallet_id: WalletId,
    /// Balance after the update
    pub balance: Decimal,
    /// Committed rows in the order they were added
    pub transactions: Vec<Transaction>,
}

/// Runs inside an atomic commit, after every condition passed and before
/// anything is visible. An error aborts the commit.
pub type CommitHook<'h> = &'h mut dyn FnMut(&[CommitOutcome]) -> Result<(), LedgerError>;

/// Atomic wallet storage
pub trait LedgerStore: Send + Sync {
    /// Wallet of `account_id` in `currency`, if one exists
    fn find_wallet(&self, account_id: AccountId, currency: &str) -> Result<Option<Wallet>, LedgerError>;

    /// Wallet of `account_id` in `currency`, opened empty when missing
    fn wallet_for(&self, account_id: AccountId, currency: &str) -> Result<Wallet, LedgerError>;

    /// Latest committed state of a wallet
    fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError>;

    /// Apply every update or none.
    ///
    /// Fails with [`LedgerError::DuplicateReference`] if any entry reuses a
    /// committed reference, and with [`LedgerError::InsufficientBalance`] if
    /// any wallet without `allow_negative` would end below zero.
    fn apply(&self, updates: &[WalletUpdate]) -> Result<Vec<CommitOutcome>, LedgerError> {
        self.apply_with(updates, &mut |_| Ok(()))
    }

    /// [`apply`](Self::apply) with `on_commit` joined to the same unit.
    ///
    /// `on_commit` sees the outcomes about to be committed. If it fails the
    /// store applies nothing and returns its error. It must not call back
    /// into the store.
    fn apply_with(&self, updates: &[WalletUpdate], on_commit: CommitHook<'_>) -> Result<Vec<CommitOutcome>, LedgerError>;

    /// Committed rows of a wallet, oldest first
    fn transactions(&self, wallet_id: WalletId) -> Result<Vec<Transaction>, LedgerError>;
}

/// Balance right after each amount, walking back from `final_balance`
pub fn running_balances(final_balance: Decimal, amounts: &[Decimal]) -> Vec<Decimal> {
    let mut balances = vec![Decimal::ZERO; amounts.len()];
    let mut balance = final_balance;
    for (i, amount) in amounts.iter().enumerate().rev() {
        balances[i] = balance;
        balance -= *amount;
    }
    balances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_balances_backward() {
        let amounts = [Decimal::from(10), Decimal::from(-3), Decimal::from(5)];
        let balances = running_balances(Decimal::from(112), &amounts);
        assert_eq!(balances, vec![Decimal::from(110), Decimal::from(107), Decimal::from(112)]);
    }

    #[test]
    fn test_running_balances_empty() {
        assert!(running_balances(Decimal::ONE, &[]).is_empty());
    }
}
