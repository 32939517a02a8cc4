//! Trade construction
//!
//! Builds the [`Trade`] record of one crossing and hands out the
//! engine-wide trade sequence. The executor is shared by all lanes.
//!
//! The trade id is derived from both orders as they were read, so retrying
//! a crossing after a crash produces the same ledger references.

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use types::ids::{MarketId, TradeId};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};
use types::trade::Trade;

use super::crossing;

/// Match execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("matched amount must be positive")]
    InvalidQuantity,

    #[error("expected a buy and a sell order")]
    SideMismatch,

    #[error("order {order} does not belong to market {symbol}")]
    WrongMarket { order: String, symbol: MarketId },

    #[error("two market orders cannot be matched together")]
    DualMarketOrders,
}

/// Trade factory with sequence generation
#[derive(Debug)]
pub struct MatchExecutor {
    sequence_counter: AtomicU64,
}

impl MatchExecutor {
    /// Create a new match executor with starting sequence number
    pub fn new(starting_sequence: u64) -> Self {
        Self {
            sequence_counter: AtomicU64::new(starting_sequence),
        }
    }

    /// Get next sequence number (monotonically increasing)
    fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Build the trade of a buy/sell crossing at `price`
    #[allow(clippy::too_many_arguments)]
    pub fn execute_trade(
        &self,
        symbol: &MarketId,
        buy: &Order,
        sell: &Order,
        price: Price,
        amount: Quantity,
        buy_fee: Decimal,
        sell_fee: Decimal,
        timestamp: i64,
    ) -> Result<Trade, MatchError> {
        if buy.side != Side::BUY || sell.side != Side::SELL {
            return Err(MatchError::SideMismatch);
        }
        if buy.is_market() && sell.is_market() {
            return Err(MatchError::DualMarketOrders);
        }
        for order in [buy, sell] {
            if &order.symbol != symbol {
                return Err(MatchError::WrongMarket {
                    order: order.order_id.to_string(),
                    symbol: symbol.clone(),
                });
            }
        }
        if amount.is_zero() {
            return Err(MatchError::InvalidQuantity);
        }

        let mut trade = Trade::new(
            self.next_sequence(),
            symbol.clone(),
            buy.order_id,
            sell.order_id,
            buy.account_id,
            sell.account_id,
            crossing::maker_side(buy, sell),
            price,
            amount,
            buy_fee,
            sell_fee,
            timestamp,
        );
        trade.trade_id = TradeId::for_match(sell.order_id, sell.version, buy.order_id, buy.version);
        Ok(trade)
    }
}
