//! Balance validation of matching candidates
//!
//! An order may only be matched while the wallet it pays from is active and
//! its available balance, net of blocked funds, covers what is left of it. Results are cached per cycle by
//! order id. Settling a trade invalidates every cached result drawing on the
//! wallets the trade touched, so those orders are checked again against the
//! fresh balance before their next match.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use types::ids::{OrderId, WalletId};
use types::market::Market;
use types::order::{CancelReason, Order};

use ledger::{LedgerError, LedgerStore};

/// Outcome of validating one order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// The order must be canceled for this reason
    Invalid(CancelReason),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Per-cycle validated-order cache backed by committed wallet balances
pub struct OrderValidator<'a> {
    ledger: &'a dyn LedgerStore,
    /// Multiplier on the paying balance for market buys
    range_allowance: Decimal,
    validated: HashSet<OrderId>,
    by_wallet: HashMap<WalletId, HashSet<OrderId>>,
}

impl<'a> OrderValidator<'a> {
    pub fn new(ledger: &'a dyn LedgerStore, range_allowance: Decimal) -> Self {
        Self {
            ledger,
            range_allowance,
            validated: HashSet::new(),
            by_wallet: HashMap::new(),
        }
    }

    pub fn is_validated(&self, order_id: OrderId) -> bool {
        self.validated.contains(&order_id)
    }

    /// Check `order` against the latest committed balance of its paying wallet
    pub fn validate(&mut self, order: &Order, market: &Market) -> Result<Validation, LedgerError> {
        if self.validated.contains(&order.order_id) {
            return Ok(Validation::Valid);
        }

        let currency = if order.is_buy() {
            &market.dst_currency
        } else {
            &market.src_currency
        };
        let Some(wallet) = self.ledger.find_wallet(order.account_id, currency)? else {
            debug!(order_id = %order.order_id, currency = %currency, "No paying wallet");
            return Ok(Validation::Invalid(CancelReason::InsufficientBalance));
        };
        if !wallet.is_active {
            return Ok(Validation::Invalid(CancelReason::InactiveWallet));
        }

        let covered = match order.required_funds() {
            Some(required) if order.is_buy() && order.is_market() => {
                required <= wallet.available() * self.range_allowance
            }
            Some(required) => wallet.covers(required),
            // Market buy without a guard price: the clamp at match time bounds it
            None => wallet.available() > Decimal::ZERO,
        };
        if !covered {
            debug!(
                order_id = %order.order_id,
                wallet_id = %wallet.wallet_id,
                available = %wallet.available(),
                "Order not covered by available balance"
            );
            return Ok(Validation::Invalid(CancelReason::InsufficientBalance));
        }

        self.validated.insert(order.order_id);
        self.by_wallet
            .entry(wallet.wallet_id)
            .or_default()
            .insert(order.order_id);
        Ok(Validation::Valid)
    }

    /// Drop cached results of every order paying from `wallet_id`
    pub fn invalidate_wallet(&mut self, wallet_id: WalletId) {
        if let Some(orders) = self.by_wallet.remove(&wallet_id) {
            for order_id in orders {
                self.validated.remove(&order_id);
            }
        }
    }
}
