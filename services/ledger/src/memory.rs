//! In-memory ledger store
//!
//! A single mutex guards wallets, rows and the reference index, so every
//! [`LedgerStore::apply_with`] call, commit hook included, is one critical
//! section.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use types::clock::now_nanos;
use types::ids::{AccountId, TransactionId, WalletId};
use types::numeric::quantize_money;
use types::wallet::{RefModule, Reference, Transaction, TransactionType, Wallet};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::store::{running_balances, CommitHook, CommitOutcome, Entry, LedgerStore, WalletUpdate};

#[derive(Debug, Default)]
struct Inner {
    wallets: HashMap<WalletId, Wallet>,
    by_owner: HashMap<(AccountId, String), WalletId>,
    transactions: HashMap<WalletId, Vec<Transaction>>,
    references: HashSet<Reference>,
}

impl Inner {
    fn open(&mut self, account_id: AccountId, currency: &str) -> Wallet {
        let key = (account_id, currency.to_string());
        if let Some(wallet) = self.by_owner.get(&key).and_then(|id| self.wallets.get(id)) {
            return wallet.clone();
        }
        let wallet = Wallet::new(account_id, currency, now_nanos());
        debug!(wallet_id = %wallet.wallet_id, account_id = %account_id, currency, "Wallet opened");
        self.by_owner.insert(key, wallet.wallet_id);
        self.wallets.insert(wallet.wallet_id, wallet.clone());
        wallet
    }
}

/// Result of checking a wallet against its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub wallet_id: WalletId,
    pub balance: Decimal,
    /// Sum of all committed amounts
    pub ledger_sum: Decimal,
    /// Running balance of the newest row
    pub last_running_balance: Option<Decimal>,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.balance == self.ledger_sum
            && self.last_running_balance.map_or(self.balance.is_zero(), |b| b == self.balance)
    }
}

/// Mutex-backed [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }

    /// Credit `amount` to the account's wallet through a deposit row
    pub fn fund(&self, account_id: AccountId, currency: &str, amount: Decimal) -> Result<Wallet, LedgerError> {
        let wallet = self.wallet_for(account_id, currency)?;
        let update = WalletUpdate {
            wallet_id: wallet.wallet_id,
            entries: vec![Entry {
                tp: TransactionType::Deposit,
                amount: quantize_money(amount),
                description: format!("Deposit {amount} {currency}"),
                reference: Reference::new(RefModule::Deposit, Uuid::now_v7()),
            }],
            allow_negative: false,
        };
        self.apply(&[update])?;
        self.wallet(wallet.wallet_id)
    }

    /// Flip the active flag of a wallet
    pub fn set_active(&self, wallet_id: WalletId, is_active: bool) -> Result<(), LedgerError> {
        let mut inner = self.lock()?;
        let wallet = inner
            .wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;
        wallet.is_active = is_active;
        Ok(())
    }

    /// Hold `amount` of a wallet's balance out of trading
    pub fn set_blocked(&self, wallet_id: WalletId, amount: Decimal) -> Result<(), LedgerError> {
        let mut inner = self.lock()?;
        let wallet = inner
            .wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;
        wallet.blocked = quantize_money(amount);
        Ok(())
    }

    /// Compare a wallet's balance with the sum of its rows
    pub fn reconcile(&self, wallet_id: WalletId) -> Result<Reconciliation, LedgerError> {
        let inner = self.lock()?;
        let wallet = inner
            .wallets
            .get(&wallet_id)
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;
        let rows = inner.transactions.get(&wallet_id);
        let ledger_sum = rows.map_or(Decimal::ZERO, |rows| rows.iter().map(|t| t.amount).sum());
        let last_running_balance = rows.and_then(|rows| rows.last()).map(|t| t.balance);

        let report = Reconciliation {
            wallet_id,
            balance: wallet.balance,
            ledger_sum,
            last_running_balance,
        };
        if !report.is_balanced() {
            warn!(
                wallet_id = %wallet_id,
                balance = %report.balance,
                ledger_sum = %report.ledger_sum,
                "Wallet out of balance with its ledger"
            );
        }
        Ok(report)
    }

    /// Every wallet in the store
    pub fn wallets(&self) -> Result<Vec<Wallet>, LedgerError> {
        Ok(self.lock()?.wallets.values().cloned().collect())
    }

    /// Whether a reference has been committed
    pub fn is_committed(&self, reference: &Reference) -> Result<bool, LedgerError> {
        Ok(self.lock()?.references.contains(reference))
    }
}

impl LedgerStore for MemoryLedger {
    fn find_wallet(&self, account_id: AccountId, currency: &str) -> Result<Option<Wallet>, LedgerError> {
        let inner = self.lock()?;
        Ok(inner
            .by_owner
            .get(&(account_id, currency.to_string()))
            .and_then(|id| inner.wallets.get(id))
            .cloned())
    }

    fn wallet_for(&self, account_id: AccountId, currency: &str) -> Result<Wallet, LedgerError> {
        Ok(self.lock()?.open(account_id, currency))
    }

    fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        self.lock()?
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))
    }

    fn apply_with(&self, updates: &[WalletUpdate], on_commit: CommitHook<'_>) -> Result<Vec<CommitOutcome>, LedgerError> {
        let mut inner = self.lock()?;

        // Idempotency: no reference may repeat, in the store or in the batch
        let mut seen = HashSet::new();
        for entry in updates.iter().flat_map(|u| u.entries.iter()) {
            if inner.references.contains(&entry.reference) || !seen.insert(entry.reference) {
                return Err(LedgerError::DuplicateReference(entry.reference));
            }
        }

        // Conditional update, checked for every wallet before anything is written
        let mut projected: HashMap<WalletId, Decimal> = HashMap::new();
        let mut targets = Vec::with_capacity(updates.len());
        for update in updates {
            let wallet = inner
                .wallets
                .get(&update.wallet_id)
                .ok_or_else(|| LedgerError::WalletNotFound(update.wallet_id.to_string()))?;
            let delta = update.delta();
            if !wallet.is_active && delta < Decimal::ZERO {
                return Err(LedgerError::InactiveWallet(wallet.wallet_id));
            }
            let balance = projected.entry(update.wallet_id).or_insert(wallet.balance);
            let next = *balance + delta;
            if !update.allow_negative && next < Decimal::ZERO {
                return Err(LedgerError::InsufficientBalance {
                    wallet_id: update.wallet_id,
                    balance: *balance,
                    delta,
                });
            }
            *balance = next;
            targets.push(next);
        }

        let now = now_nanos();
        let outcomes: Vec<CommitOutcome> = updates
            .iter()
            .zip(targets)
            .map(|(update, balance)| {
                let amounts: Vec<Decimal> = update.entries.iter().map(|e| e.amount).collect();
                let transactions = update
                    .entries
                    .iter()
                    .zip(running_balances(balance, &amounts))
                    .map(|(entry, running)| Transaction {
                        transaction_id: TransactionId::new(),
                        wallet_id: update.wallet_id,
                        tp: entry.tp,
                        amount: entry.amount,
                        balance: running,
                        reference: entry.reference,
                        description: entry.description.clone(),
                        created_at: now,
                    })
                    .collect();
                CommitOutcome {
                    wallet_id: update.wallet_id,
                    balance,
                    transactions,
                }
            })
            .collect();

        on_commit(&outcomes)?;

        for (update, outcome) in updates.iter().zip(&outcomes) {
            if let Some(wallet) = inner.wallets.get_mut(&update.wallet_id) {
                wallet.balance = outcome.balance;
                wallet.updated_at = now;
            }
            for entry in &update.entries {
                inner.references.insert(entry.reference);
            }
            inner
                .transactions
                .entry(update.wallet_id)
                .or_default()
                .extend(outcome.transactions.iter().cloned());
        }

        debug!(wallets = updates.len(), "Ledger updates applied");
        Ok(outcomes)
    }

    fn transactions(&self, wallet_id: WalletId) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .lock()?
            .transactions
            .get(&wallet_id)
            .cloned()
            .unwrap_or_default())
    }
}
