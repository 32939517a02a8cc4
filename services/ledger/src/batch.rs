//! Multi-wallet atomic commits
//!
//! A trade touches up to six wallets. [`LedgerBatch`] hands the buffers of
//! all of them to the store in one call, so they commit together or not at
//! all. Each wallet keeps its own non-negative condition.

use std::collections::HashMap;
use tracing::debug;
use types::ids::WalletId;
use types::wallet::{Reference, Transaction, Wallet};

use crate::alert::AlertSink;
use crate::error::LedgerError;
use crate::store::{CommitOutcome, LedgerStore};
use crate::writer::{report_failure, LedgerWriter};

/// Writers of several wallets committed as one unit
#[derive(Debug, Default)]
pub struct LedgerBatch {
    writers: Vec<LedgerWriter>,
    index: HashMap<WalletId, usize>,
}

/// Rows produced by a committed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    pub transactions: Vec<Transaction>,
}

impl BatchReceipt {
    fn from_outcomes(outcomes: &[CommitOutcome]) -> Self {
        Self {
            transactions: outcomes.iter().flat_map(|o| o.transactions.iter().cloned()).collect(),
        }
    }

    /// Row committed under `reference`, if any
    pub fn find(&self, reference: &Reference) -> Option<&Transaction> {
        self.transactions.iter().find(|t| &t.reference == reference)
    }
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer for `wallet`, created on first use
    pub fn writer(&mut self, wallet: &Wallet) -> &mut LedgerWriter {
        let next = self.writers.len();
        let slot = *self.index.entry(wallet.wallet_id).or_insert(next);
        if slot == next {
            self.writers.push(LedgerWriter::new(wallet.clone()));
        }
        &mut self.writers[slot]
    }

    pub fn is_empty(&self) -> bool {
        self.writers.iter().all(|w| w.is_empty())
    }

    /// Number of wallets touched
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Commit every buffered row of every wallet atomically
    pub fn commit(self, store: &dyn LedgerStore, alerts: &dyn AlertSink) -> Result<BatchReceipt, LedgerError> {
        self.commit_with(store, alerts, |_| Ok(()))
    }

    /// Commit with `on_commit` run inside the same atomic unit.
    ///
    /// `on_commit` receives the rows about to be committed; if it fails the
    /// batch is rolled back like any other failed commit.
    pub fn commit_with<F>(
        mut self,
        store: &dyn LedgerStore,
        alerts: &dyn AlertSink,
        mut on_commit: F,
    ) -> Result<BatchReceipt, LedgerError>
    where
        F: FnMut(&BatchReceipt) -> Result<(), LedgerError>,
    {
        let updates: Vec<_> = self
            .writers
            .iter()
            .filter(|w| !w.is_empty())
            .map(|w| w.to_update(false))
            .collect();
        if updates.is_empty() {
            let receipt = BatchReceipt::default();
            on_commit(&receipt)?;
            return Ok(receipt);
        }

        let result = store.apply_with(&updates, &mut |outcomes| {
            on_commit(&BatchReceipt::from_outcomes(outcomes))
        });
        match result {
            Ok(outcomes) => {
                let receipt = BatchReceipt::from_outcomes(&outcomes);
                for outcome in &outcomes {
                    if let Some(&slot) = self.index.get(&outcome.wallet_id) {
                        self.writers[slot].settle(outcome)?;
                    }
                }
                debug!(
                    wallets = updates.len(),
                    rows = receipt.transactions.len(),
                    "Ledger batch committed"
                );
                Ok(receipt)
            }
            Err(err) => {
                for writer in &mut self.writers {
                    writer.rollback();
                }
                report_failure(alerts, &err);
                Err(err)
            }
        }
    }
}
