//! Order, trade and account collaborators of the matcher
//!
//! Orders come in through [`OrderStore::active_orders`]. A settled trade and
//! the new fill state of its two orders are written by
//! [`OrderStore::record_fill`] inside the ledger commit of that trade; other
//! changes, such as cancellations, go back through
//! [`OrderStore::update_orders`] at the end of each market round.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use types::account::Account;
use types::ids::{AccountId, MarketId, OrderId};
use types::order::Order;
use types::trade::Trade;

/// Order store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("trade {0} already recorded")]
    DuplicateTrade(String),

    #[error("order {order_id} changed since it was read: expected version {expected}, found {found}")]
    VersionConflict { order_id: OrderId, expected: u64, found: u64 },

    #[error("order store failure: {0}")]
    Backend(String),
}

/// Source and sink of orders and trades
pub trait OrderStore: Send + Sync {
    /// Active orders of a market; externally canceled orders are not returned
    fn active_orders(&self, symbol: &MarketId) -> Result<Vec<Order>, StoreError>;

    /// Persist status and fill counters of changed orders
    fn update_orders(&self, orders: &[Order]) -> Result<(), StoreError>;

    /// Record a settled trade and the filled orders as one unit.
    ///
    /// Each order comes with the version it was read at. Nothing is written
    /// if the trade id is already recorded or if any order moved on from its
    /// read version.
    fn record_fill(&self, trade: &Trade, fills: &[(&Order, u64)]) -> Result<(), StoreError>;
}

/// Resolves account metadata for fees and the forbidden-pair policy
pub trait AccountDirectory: Send + Sync {
    /// Unknown accounts resolve to a regular VIP-0 account
    fn account(&self, account_id: AccountId) -> Account;
}

/// In-memory [`OrderStore`]
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    trades: Mutex<Vec<Trade>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an order
    pub fn insert(&self, order: Order) {
        self.orders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(order.order_id, order);
    }

    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.orders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&order_id)
            .cloned()
    }

    /// Every recorded trade, in insertion order
    pub fn trades(&self) -> Vec<Trade> {
        self.trades.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OrderStore for MemoryOrderStore {
    fn active_orders(&self, symbol: &MarketId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| StoreError::Backend("order lock poisoned".to_string()))?;
        let mut active: Vec<Order> = orders
            .values()
            .filter(|o| &o.symbol == symbol && o.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|o| (o.created_at, o.order_id));
        Ok(active)
    }

    fn update_orders(&self, updated: &[Order]) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| StoreError::Backend("order lock poisoned".to_string()))?;
        if let Some(missing) = updated.iter().find(|o| !orders.contains_key(&o.order_id)) {
            return Err(StoreError::OrderNotFound(missing.order_id));
        }
        for order in updated {
            orders.insert(order.order_id, order.clone());
        }
        Ok(())
    }

    fn record_fill(&self, trade: &Trade, fills: &[(&Order, u64)]) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| StoreError::Backend("order lock poisoned".to_string()))?;
        let mut trades = self.trades.lock().map_err(|_| StoreError::Backend("trade lock poisoned".to_string()))?;
        if trades.iter().any(|t| t.trade_id == trade.trade_id) {
            return Err(StoreError::DuplicateTrade(trade.trade_id.to_string()));
        }
        for (order, read_version) in fills {
            let stored = orders
                .get(&order.order_id)
                .ok_or(StoreError::OrderNotFound(order.order_id))?;
            if stored.version != *read_version {
                return Err(StoreError::VersionConflict {
                    order_id: order.order_id,
                    expected: *read_version,
                    found: stored.version,
                });
            }
        }

        for (order, _) in fills {
            orders.insert(order.order_id, (*order).clone());
        }
        trades.push(trade.clone());
        Ok(())
    }
}

/// In-memory [`AccountDirectory`]
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        self.accounts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(account.account_id, account);
    }
}

impl AccountDirectory for MemoryAccounts {
    fn account(&self, account_id: AccountId) -> Account {
        self.accounts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&account_id)
            .cloned()
            .unwrap_or_else(|| Account::with_id(account_id, 0))
    }
}
