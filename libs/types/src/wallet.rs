//! Wallet and ledger transaction types
//!
//! A wallet holds one currency for one account. Its balance always equals
//! the sum of the amounts of its committed transactions.

use crate::ids::{AccountId, TradeId, TransactionId, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// (account, currency) balance holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: WalletId,
    pub account_id: AccountId,
    pub currency: String,
    pub balance: Decimal,
    /// Part of the balance held for withdrawals and other holds
    #[serde(default)]
    pub blocked: Decimal,
    pub is_active: bool,
    pub updated_at: i64,
}

impl Wallet {
    /// Create an empty active wallet
    pub fn new(account_id: AccountId, currency: impl Into<String>, timestamp: i64) -> Self {
        Self {
            wallet_id: WalletId::new(),
            account_id,
            currency: currency.into(),
            balance: Decimal::ZERO,
            blocked: Decimal::ZERO,
            is_active: true,
            updated_at: timestamp,
        }
    }

    /// Balance free to trade with
    pub fn available(&self) -> Decimal {
        (self.balance - self.blocked).max(Decimal::ZERO)
    }

    /// Whether the available balance covers `amount`
    pub fn covers(&self, amount: Decimal) -> bool {
        self.available() >= amount
    }
}

/// Economic kind of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Buy,
    Sell,
    Fee,
    Manual,
}

/// Subsystem that produced a ledger row.
///
/// The A/B suffix distinguishes the two postings one trade makes on each
/// side: A is the payment, B is the proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RefModule {
    /// Seller pays the source currency
    TradeSellA,
    /// Seller receives the destination currency
    TradeSellB,
    /// Buyer pays the destination currency
    TradeBuyA,
    /// Buyer receives the source currency
    TradeBuyB,
    /// Buyer fee collected in the source currency
    TradeFeeA,
    /// Seller fee collected in the destination currency
    TradeFeeB,
    Deposit,
    Manual,
}

impl RefModule {
    /// Stable numeric code of the module
    pub fn code(&self) -> u16 {
        match self {
            RefModule::TradeSellA => 41,
            RefModule::TradeSellB => 42,
            RefModule::TradeBuyA => 43,
            RefModule::TradeBuyB => 44,
            RefModule::TradeFeeA => 45,
            RefModule::TradeFeeB => 46,
            RefModule::Deposit => 10,
            RefModule::Manual => 90,
        }
    }
}

/// Idempotency key of a ledger row: at most one committed row per reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub module: RefModule,
    pub id: Uuid,
}

impl Reference {
    pub fn new(module: RefModule, id: Uuid) -> Self {
        Self { module, id }
    }

    /// Reference of one of the postings a trade produces
    pub fn trade(module: RefModule, trade_id: TradeId) -> Self {
        Self::new(module, *trade_id.as_uuid())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}):{}", self.module, self.module.code(), self.id)
    }
}

/// Immutable committed ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub tp: TransactionType,
    /// Signed delta applied to the wallet
    pub amount: Decimal,
    /// Wallet balance right after this row
    pub balance: Decimal,
    pub reference: Reference,
    pub description: String,
    pub created_at: i64,
}
