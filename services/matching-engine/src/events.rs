//! Event structures for the matching engine
//!
//! Every market round returns the events it produced, in the order they
//! happened, for downstream consumers (market data, notifications).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{MarketId, OrderId, TradeId};
use types::numeric::{Price, Quantity};
use types::order::{CancelReason, Order, Side};
use types::trade::Trade;

/// Trade settled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSettledEvent {
    pub trade_id: TradeId,
    pub sequence: u64,
    pub symbol: MarketId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub maker_side: Side,
    pub price: Price,
    pub amount: Quantity,
    pub buy_fee: Decimal,
    pub sell_fee: Decimal,
    pub executed_at: i64,
}

/// Order completely matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDoneEvent {
    pub order_id: OrderId,
    pub symbol: MarketId,
    pub matched_amount: Quantity,
    pub average_price: Decimal,
    pub total_fee: Decimal,
}

/// Order canceled by the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCanceledEvent {
    pub order_id: OrderId,
    pub symbol: MarketId,
    pub reason: CancelReason,
    pub filled_amount: Quantity,
    pub unfilled_amount: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherEvent {
    TradeSettled(TradeSettledEvent),
    OrderDone(OrderDoneEvent),
    OrderCanceled(OrderCanceledEvent),
}

impl MatcherEvent {
    pub fn trade_settled(trade: &Trade) -> Self {
        MatcherEvent::TradeSettled(TradeSettledEvent {
            trade_id: trade.trade_id,
            sequence: trade.sequence,
            symbol: trade.symbol.clone(),
            buy_order_id: trade.buy_order_id,
            sell_order_id: trade.sell_order_id,
            maker_side: trade.maker_side,
            price: trade.price,
            amount: trade.amount,
            buy_fee: trade.buy_fee,
            sell_fee: trade.sell_fee,
            executed_at: trade.executed_at,
        })
    }

    pub fn order_done(order: &Order) -> Self {
        MatcherEvent::OrderDone(OrderDoneEvent {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            matched_amount: order.matched_amount,
            average_price: order.average_price(),
            total_fee: order.fee,
        })
    }

    pub fn order_canceled(order: &Order, reason: CancelReason) -> Self {
        MatcherEvent::OrderCanceled(OrderCanceledEvent {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            reason,
            filled_amount: order.matched_amount,
            unfilled_amount: order.unmatched_amount(),
        })
    }
}
