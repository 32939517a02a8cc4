//! Market (trading pair) definition

use crate::ids::MarketId;
use serde::{Deserialize, Serialize};

/// Decimal places used for amounts when a market does not say otherwise
pub const DEFAULT_AMOUNT_PRECISION: u32 = 8;
/// Decimal places used for prices when a market does not say otherwise
pub const DEFAULT_PRICE_PRECISION: u32 = 8;

/// A market trades the source currency against the destination currency.
///
/// Sellers pay `src_currency` and receive `dst_currency`; buyers do the
/// reverse. Partitioning groups markets by `dst_currency`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    pub symbol: MarketId,
    pub src_currency: String,
    pub dst_currency: String,
    pub is_active: bool,
    pub amount_precision: u32,
    pub price_precision: u32,
}

impl Market {
    /// Create an active market with default precision
    pub fn new(src_currency: impl Into<String>, dst_currency: impl Into<String>) -> Self {
        let src_currency = src_currency.into();
        let dst_currency = dst_currency.into();
        Self {
            symbol: MarketId::from_pair(&src_currency, &dst_currency),
            src_currency,
            dst_currency,
            is_active: true,
            amount_precision: DEFAULT_AMOUNT_PRECISION,
            price_precision: DEFAULT_PRICE_PRECISION,
        }
    }

    pub fn with_precision(mut self, amount_precision: u32, price_precision: u32) -> Self {
        self.amount_precision = amount_precision;
        self.price_precision = price_precision;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether the symbol agrees with the currency codes
    pub fn symbol_matches_pair(&self) -> bool {
        self.symbol.split() == (self.src_currency.as_str(), self.dst_currency.as_str())
    }
}
