//! Per-wallet transaction writer
//!
//! Buffers signed deltas for one wallet and commits them with a single
//! conditional update. A failed commit discards the buffer and restores the
//! cached balance; nothing is partially applied.

use rust_decimal::Decimal;
use tracing::{debug, error};
use types::numeric::quantize_money;
use types::wallet::{Reference, Transaction, TransactionType, Wallet};

use crate::alert::{Alert, AlertSink};
use crate::error::LedgerError;
use crate::store::{CommitOutcome, Entry, LedgerStore, WalletUpdate};

/// Buffered writer for one wallet
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    wallet: Wallet,
    pending: Vec<Entry>,
    /// Cached balance plus every pending delta
    running_total: Decimal,
}

impl LedgerWriter {
    pub fn new(wallet: Wallet) -> Self {
        let running_total = wallet.balance;
        Self {
            wallet,
            pending: Vec::new(),
            running_total,
        }
    }

    /// Cached wallet, as of the last successful commit
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Balance the wallet will have once the buffer is committed
    pub fn running_total(&self) -> Decimal {
        self.running_total
    }

    pub fn pending(&self) -> &[Entry] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Buffer a signed delta
    pub fn add(
        &mut self,
        tp: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
        reference: Reference,
    ) -> &mut Self {
        let amount = quantize_money(amount);
        self.running_total += amount;
        self.pending.push(Entry {
            tp,
            amount,
            description: description.into(),
            reference,
        });
        self
    }

    pub(crate) fn to_update(&self, allow_negative: bool) -> WalletUpdate {
        WalletUpdate {
            wallet_id: self.wallet.wallet_id,
            entries: self.pending.clone(),
            allow_negative,
        }
    }

    pub(crate) fn settle(&mut self, outcome: &CommitOutcome) -> Result<(), LedgerError> {
        if outcome.wallet_id != self.wallet.wallet_id {
            return Err(LedgerError::WalletMismatch {
                expected: self.wallet.wallet_id,
                actual: outcome.wallet_id,
            });
        }
        self.wallet.balance = outcome.balance;
        self.running_total = outcome.balance;
        self.pending.clear();
        Ok(())
    }

    pub(crate) fn rollback(&mut self) {
        self.pending.clear();
        self.running_total = self.wallet.balance;
    }

    /// Commit the buffer as one atomic conditional update.
    ///
    /// An empty buffer is a no-op returning no rows.
    pub fn commit(
        &mut self,
        store: &dyn LedgerStore,
        alerts: &dyn AlertSink,
        allow_negative: bool,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let update = self.to_update(allow_negative);
        match store.apply(std::slice::from_ref(&update)) {
            Ok(mut outcomes) => {
                let outcome = outcomes
                    .pop()
                    .ok_or_else(|| LedgerError::Storage("store returned no outcome".to_string()))?;
                self.settle(&outcome)?;
                debug!(
                    wallet_id = %self.wallet.wallet_id,
                    rows = outcome.transactions.len(),
                    balance = %outcome.balance,
                    "Wallet transactions committed"
                );
                Ok(outcome.transactions)
            }
            Err(err) => {
                self.rollback();
                report_failure(alerts, &err);
                Err(err)
            }
        }
    }
}

/// Log and alert on a failed commit; replays are expected and stay quiet
pub(crate) fn report_failure(alerts: &dyn AlertSink, err: &LedgerError) {
    if err.is_duplicate() {
        debug!(error = %err, "Ledger commit skipped, reference already committed");
        return;
    }
    error!(error = %err, "Ledger commit failed");
    alerts.notify(Alert::new("Ledger commit failed", err.to_string()));
}
