//! Crossing detection and price/time priority
//!
//! Sells are ranked by ascending price, buys by descending price. Market
//! orders rank ahead of every limit order on their side, and ties go to the
//! earlier order.

use std::cmp::Ordering;
use types::numeric::Price;
use types::order::{Order, Side};

/// Check if a bid and ask can match at given prices
///
/// For a buy order to match with a sell order:
/// - Buy price must be >= sell price
pub fn can_match(bid_price: Price, ask_price: Price) -> bool {
    bid_price >= ask_price
}

/// Whether a buy and a sell order cross.
///
/// A market order crosses any limit order. Two market orders never match.
pub fn orders_cross(buy: &Order, sell: &Order) -> bool {
    match (buy.is_market(), sell.is_market()) {
        (true, true) => false,
        (true, false) | (false, true) => true,
        (false, false) => match (buy.price, sell.price) {
            (Some(bid), Some(ask)) => can_match(bid, ask),
            _ => false,
        },
    }
}

/// Side of the resting order whose price is used.
///
/// A market order is always the taker; otherwise the earlier order is the
/// maker, the seller on equal timestamps.
pub fn maker_side(buy: &Order, sell: &Order) -> Side {
    if sell.is_market() {
        Side::BUY
    } else if buy.is_market() || sell.created_at <= buy.created_at {
        Side::SELL
    } else {
        Side::BUY
    }
}

fn priority(a: &Order, b: &Order, price_order: impl Fn(&Price, &Price) -> Ordering) -> Ordering {
    b.is_market()
        .cmp(&a.is_market())
        .then_with(|| match (a.is_market(), a.price, b.price) {
            (false, Some(pa), Some(pb)) => price_order(&pa, &pb),
            _ => Ordering::Equal,
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.order_id.cmp(&b.order_id))
}

/// Best sell first
pub fn sort_sells(sells: &mut [Order]) {
    sells.sort_by(|a, b| priority(a, b, |pa, pb| pa.cmp(pb)));
}

/// Best buy first
pub fn sort_buys(buys: &mut [Order]) {
    buys.sort_by(|a, b| priority(a, b, |pa, pb| pb.cmp(pa)));
}
