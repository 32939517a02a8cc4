//! Order lifecycle types
//!
//! An order is `Active` until it is fully matched (`Done`) or canceled.
//! Both `Done` and `Canceled` are terminal.

use crate::errors::OrderError;
use crate::ids::{AccountId, MarketId, OrderId};
use crate::numeric::{quantize_money, Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid): pays the destination currency
    BUY,
    /// Sell order (ask): pays the source currency
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// How the order is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Rests in the book at its limit price
    Limit,
    /// Takes whatever the book offers; the price, if any, is only a guard
    Market,
}

/// Why an order left the book without being filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    UserRequested,
    InsufficientBalance,
    InactiveWallet,
    ForbiddenPair,
    UnexpectedPrice,
    ZeroPrice,
    UnfilledMarketOrder,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum OrderStatus {
    #[serde(rename = "ACTIVE")]
    Active,

    /// Completely matched (terminal)
    #[serde(rename = "DONE")]
    Done,

    /// Canceled by the user or the matcher (terminal)
    #[serde(rename = "CANCELED")]
    Canceled(CancelReason),
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

/// Complete order structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: MarketId,
    pub side: Side,
    pub execution: ExecutionType,
    /// Limit price; for market orders an optional guard price
    pub price: Option<Price>,
    pub amount: Quantity,
    pub matched_amount: Quantity,
    /// Sum of `fill × price` over every fill
    pub matched_total_price: Decimal,
    /// Fee accrued so far, in the currency this order receives
    pub fee: Decimal,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
    pub version: u64,
}

impl Order {
    /// Create a new active limit order
    pub fn limit(
        account_id: AccountId,
        symbol: MarketId,
        side: Side,
        price: Price,
        amount: Quantity,
        timestamp: i64,
    ) -> Self {
        Self::build(account_id, symbol, side, ExecutionType::Limit, Some(price), amount, timestamp)
    }

    /// Create a new active market order with an optional guard price
    pub fn market(
        account_id: AccountId,
        symbol: MarketId,
        side: Side,
        guard_price: Option<Price>,
        amount: Quantity,
        timestamp: i64,
    ) -> Self {
        Self::build(account_id, symbol, side, ExecutionType::Market, guard_price, amount, timestamp)
    }

    fn build(
        account_id: AccountId,
        symbol: MarketId,
        side: Side,
        execution: ExecutionType,
        price: Option<Price>,
        amount: Quantity,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            account_id,
            symbol,
            side,
            execution,
            price,
            amount,
            matched_amount: Quantity::zero(),
            matched_total_price: Decimal::ZERO,
            fee: Decimal::ZERO,
            status: OrderStatus::Active,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::BUY
    }

    pub fn is_sell(&self) -> bool {
        self.side == Side::SELL
    }

    pub fn is_market(&self) -> bool {
        self.execution == ExecutionType::Market
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    pub fn unmatched_amount(&self) -> Quantity {
        self.amount - self.matched_amount
    }

    /// Nothing meaningful is left to match
    pub fn is_matched(&self) -> bool {
        self.unmatched_amount().is_zero()
    }

    pub fn is_partial(&self) -> bool {
        !self.matched_amount.is_zero() && !self.is_matched()
    }

    /// Quote value of the unmatched part, when the order carries a price
    pub fn unmatched_total_price(&self) -> Option<Decimal> {
        self.price
            .map(|price| price.as_decimal() * self.unmatched_amount().as_decimal())
    }

    /// Funds the paying wallet must still cover.
    ///
    /// Buys pay the destination currency, sells pay the source currency.
    /// A market buy without a guard price has no computable requirement.
    pub fn required_funds(&self) -> Option<Decimal> {
        match self.side {
            Side::BUY => self.unmatched_total_price(),
            Side::SELL => Some(self.unmatched_amount().as_decimal()),
        }
    }

    /// Volume-weighted price of the fills so far
    pub fn average_price(&self) -> Decimal {
        if self.matched_amount.is_zero() {
            return Decimal::ZERO;
        }
        self.matched_total_price / self.matched_amount.as_decimal()
    }

    /// Record a fill and move to `Done` once nothing is left
    pub fn add_fill(
        &mut self,
        fill: Quantity,
        price: Price,
        fee: Decimal,
        timestamp: i64,
    ) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: format!("{:?}", self.status),
            });
        }
        let unmatched = self.unmatched_amount();
        if fill > unmatched {
            return Err(OrderError::Overfill {
                fill: fill.to_string(),
                unmatched: unmatched.to_string(),
            });
        }

        self.matched_amount = self.matched_amount + fill;
        self.matched_total_price =
            quantize_money(self.matched_total_price + fill.as_decimal() * price.as_decimal());
        self.fee = quantize_money(self.fee + fee);
        if self.is_matched() {
            self.status = OrderStatus::Done;
        }
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }

    /// Cancel the order
    pub fn cancel(&mut self, reason: CancelReason, timestamp: i64) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: format!("{:?}", self.status),
            });
        }
        self.status = OrderStatus::Canceled(reason);
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc_order(side: Side, price: u64, amount: &str) -> Order {
        Order::limit(
            AccountId::new(),
            MarketId::new("BTC/USDT"),
            side,
            Price::from_u64(price),
            Quantity::from_str(amount).unwrap(),
            1708123456789000000,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::BUY.opposite(), Side::SELL);
        assert_eq!(Side::SELL.opposite(), Side::BUY);
    }

    #[test]
    fn test_order_creation() {
        let order = btc_order(Side::BUY, 50000, "1.0");
        assert_eq!(order.status, OrderStatus::Active);
        assert!(!order.is_partial());
        assert_eq!(order.required_funds(), Some(Decimal::from(50000)));
    }

    #[test]
    fn test_partial_then_full_fill() {
        let mut order = btc_order(Side::SELL, 50000, "1.0");
        let price = Price::from_u64(50000);

        order
            .add_fill(Quantity::from_str("0.3").unwrap(), price, Decimal::ZERO, 1)
            .unwrap();
        assert!(order.is_active());
        assert!(order.is_partial());
        assert_eq!(order.required_funds(), Some(Decimal::from_str_exact("0.7").unwrap()));

        order
            .add_fill(Quantity::from_str("0.7").unwrap(), price, Decimal::ONE, 2)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Done);
        assert_eq!(order.matched_total_price, Decimal::from(50000));
        assert_eq!(order.average_price(), Decimal::from(50000));
        assert_eq!(order.fee, Decimal::ONE);
        assert_eq!(order.version, 2);
    }

    #[test]
    fn test_overfill_rejected() {
        let mut order = btc_order(Side::BUY, 50000, "1.0");
        let err = order
            .add_fill(Quantity::from_str("1.5").unwrap(), Price::from_u64(50000), Decimal::ZERO, 1)
            .unwrap_err();
        assert!(matches!(err, OrderError::Overfill { .. }));
        assert!(order.matched_amount.is_zero());
    }

    #[test]
    fn test_cancel_terminal_rejected() {
        let mut order = btc_order(Side::BUY, 50000, "1.0");
        order.cancel(CancelReason::UserRequested, 1).unwrap();
        assert_eq!(order.status, OrderStatus::Canceled(CancelReason::UserRequested));
        assert!(order.cancel(CancelReason::ForbiddenPair, 2).is_err());
    }

    #[test]
    fn test_market_buy_without_guard_has_no_requirement() {
        let order = Order::market(
            AccountId::new(),
            MarketId::new("BTC/USDT"),
            Side::BUY,
            None,
            Quantity::from_str("0.1").unwrap(),
            1,
        );
        assert!(order.is_market());
        assert_eq!(order.required_funds(), None);
    }

    #[test]
    fn test_order_serialization() {
        let mut order = btc_order(Side::SELL, 3000, "2.5");
        order.cancel(CancelReason::InsufficientBalance, 5).unwrap();

        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
        assert!(json.contains("INSUFFICIENT_BALANCE"));
    }
}
