//! Shared fixture: in-memory stores wired into an engine

#![allow(dead_code)]

use ledger::{LedgerStore, MemoryLedger, RecordingAlerts};
use matching_engine::{EngineConfig, MatchingEngine, MemoryAccounts, MemoryOrderStore, MemorySettings, OrderStore};
use rust_decimal::Decimal;
use std::sync::Arc;
use types::ids::{AccountId, MarketId, OrderId};
use types::market::Market;
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, Side};
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

pub fn fee_account() -> AccountId {
    AccountId::from_uuid(Uuid::from_u128(0xfee))
}

pub struct World {
    pub settings: Arc<MemorySettings>,
    pub orders: Arc<MemoryOrderStore>,
    pub ledger: Arc<MemoryLedger>,
    pub accounts: Arc<MemoryAccounts>,
    pub alerts: Arc<RecordingAlerts>,
}

impl World {
    pub fn new() -> Self {
        init_tracing();
        Self {
            settings: Arc::new(MemorySettings::new()),
            orders: Arc::new(MemoryOrderStore::new()),
            ledger: Arc::new(MemoryLedger::new()),
            accounts: Arc::new(MemoryAccounts::new()),
            alerts: Arc::new(RecordingAlerts::new()),
        }
    }

    pub fn engine(&self) -> MatchingEngine {
        self.engine_with_ledger(self.ledger.clone())
    }

    pub fn engine_with_ledger(&self, ledger: Arc<dyn LedgerStore>) -> MatchingEngine {
        self.engine_with(self.orders.clone(), ledger)
    }

    pub fn engine_with_orders(&self, orders: Arc<dyn OrderStore>) -> MatchingEngine {
        self.engine_with(orders, self.ledger.clone())
    }

    fn engine_with(&self, orders: Arc<dyn OrderStore>, ledger: Arc<dyn LedgerStore>) -> MatchingEngine {
        let config = EngineConfig {
            fee_account: fee_account(),
            ..EngineConfig::default()
        };
        MatchingEngine::new(
            config,
            self.settings.clone(),
            orders,
            ledger,
            self.accounts.clone(),
            self.alerts.clone(),
        )
    }

    /// New account funded with the given balances
    pub fn trader(&self, funds: &[(&str, &str)]) -> AccountId {
        let account = AccountId::new();
        for (currency, amount) in funds {
            self.ledger.fund(account, currency, dec(amount)).unwrap();
        }
        account
    }

    pub fn limit(&self, account: AccountId, symbol: &str, side: Side, price: &str, amount: &str, ts: i64) -> OrderId {
        let order = Order::limit(
            account,
            MarketId::new(symbol),
            side,
            Price::from_str(price).unwrap(),
            Quantity::from_str(amount).unwrap(),
            ts,
        );
        let id = order.order_id;
        self.orders.insert(order);
        id
    }

    pub fn market(&self, account: AccountId, symbol: &str, side: Side, guard: Option<&str>, amount: &str, ts: i64) -> OrderId {
        let order = Order::market(
            account,
            MarketId::new(symbol),
            side,
            guard.map(|g| Price::from_str(g).unwrap()),
            Quantity::from_str(amount).unwrap(),
            ts,
        );
        let id = order.order_id;
        self.orders.insert(order);
        id
    }

    pub fn order(&self, id: OrderId) -> Order {
        self.orders.order(id).unwrap()
    }

    pub fn status(&self, id: OrderId) -> OrderStatus {
        self.order(id).status
    }

    pub fn balance(&self, account: AccountId, currency: &str) -> Decimal {
        self.ledger
            .find_wallet(account, currency)
            .unwrap()
            .map_or(Decimal::ZERO, |w| w.balance)
    }

    /// Every wallet's balance equals the sum of its rows
    pub fn assert_reconciled(&self) {
        for wallet in self.ledger.wallets().unwrap() {
            let report = self.ledger.reconcile(wallet.wallet_id).unwrap();
            assert!(report.is_balanced(), "wallet {} out of balance", wallet.wallet_id);
        }
    }
}

pub fn btc_usdt() -> Market {
    Market::new("BTC", "USDT")
}
