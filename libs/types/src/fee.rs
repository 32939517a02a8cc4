//! Fee schedule types
//!
//! Rates are fractions of the amount they apply to (0.002 = 0.2%). The buyer
//! pays its fee on the received amount, the seller on the received notional.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Liquidity role of an order within a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liquidity {
    /// Resting order whose price was used
    Maker,
    /// Incoming order
    Taker,
}

/// Fee tier for one VIP level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTier {
    pub vip_level: u8,
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl FeeTier {
    pub fn rate(&self, liquidity: Liquidity) -> Decimal {
        match liquidity {
            Liquidity::Maker => self.maker_rate,
            Liquidity::Taker => self.taker_rate,
        }
    }
}

/// Built-in fee schedule used when settings carry none
pub fn default_fee_tiers() -> Vec<FeeTier> {
    vec![
        FeeTier {
            vip_level: 0,
            maker_rate: Decimal::new(20, 4), // 0.2%
            taker_rate: Decimal::new(20, 4),
        },
        FeeTier {
            vip_level: 1,
            maker_rate: Decimal::new(15, 4), // 0.15%
            taker_rate: Decimal::new(175, 5),
        },
        FeeTier {
            vip_level: 2,
            maker_rate: Decimal::new(10, 4),
            taker_rate: Decimal::new(15, 4),
        },
        FeeTier {
            vip_level: 3,
            maker_rate: Decimal::new(5, 4),
            taker_rate: Decimal::new(125, 5),
        },
    ]
}
