//! Trade execution and settlement types

use crate::ids::{AccountId, MarketId, OrderId, TradeId, TransactionId};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeState {
    /// Trade created, ledger postings not yet committed
    MATCHED,
    /// Postings committed to the ledger (terminal)
    SETTLED,
}

/// Ledger rows produced by settling one trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePostings {
    /// Seller pays the source currency
    pub sell_withdraw: TransactionId,
    /// Buyer pays the destination currency
    pub buy_withdraw: TransactionId,
    /// Seller receives notional minus fee
    pub sell_deposit: TransactionId,
    /// Buyer receives amount minus fee
    pub buy_deposit: TransactionId,
    /// Seller fee credited to the fee account (destination currency)
    pub sell_fee: Option<TransactionId>,
    /// Buyer fee credited to the fee account (source currency)
    pub buy_fee: Option<TransactionId>,
}

/// One crossing of a buy and a sell order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub sequence: u64, // Per-engine monotonic sequence
    pub symbol: MarketId,

    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_account_id: AccountId,
    pub sell_account_id: AccountId,

    /// Side of the resting order whose price was used
    pub maker_side: Side,
    pub price: Price,
    pub amount: Quantity,

    /// Charged to the buyer in the source currency
    pub buy_fee: Decimal,
    /// Charged to the seller in the destination currency
    pub sell_fee: Decimal,

    pub postings: Option<TradePostings>,

    pub executed_at: i64, // Unix nanos
    pub settled_at: Option<i64>,
    pub state: TradeState,
}

impl Trade {
    /// Create a new matched trade
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        symbol: MarketId,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        buy_account_id: AccountId,
        sell_account_id: AccountId,
        maker_side: Side,
        price: Price,
        amount: Quantity,
        buy_fee: Decimal,
        sell_fee: Decimal,
        executed_at: i64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            sequence,
            symbol,
            buy_order_id,
            sell_order_id,
            buy_account_id,
            sell_account_id,
            maker_side,
            price,
            amount,
            buy_fee,
            sell_fee,
            postings: None,
            executed_at,
            settled_at: None,
            state: TradeState::MATCHED,
        }
    }

    /// Attach the committed postings and mark the trade settled
    pub fn settle(&mut self, postings: TradePostings, timestamp: i64) {
        self.postings = Some(postings);
        self.state = TradeState::SETTLED;
        self.settled_at = Some(timestamp);
    }

    /// Matched notional (price × amount), paid by the buyer
    pub fn total_price(&self) -> Decimal {
        self.amount.as_decimal() * self.price.as_decimal()
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, TradeState::SETTLED)
    }

    /// Order id of the resting side
    pub fn maker_order_id(&self) -> OrderId {
        match self.maker_side {
            Side::BUY => self.buy_order_id,
            Side::SELL => self.sell_order_id,
        }
    }

    /// Order id of the incoming side
    pub fn taker_order_id(&self) -> OrderId {
        match self.maker_side {
            Side::BUY => self.sell_order_id,
            Side::SELL => self.buy_order_id,
        }
    }
}
