//! Fee calculation
//!
//! A fee is `base × rate`, quantized to ledger precision. The rate comes from
//! the account's manual override when it has one, otherwise from the highest
//! schedule tier not above the account's VIP level.

use rust_decimal::Decimal;
use types::account::Account;
use types::fee::{FeeTier, Liquidity};
use types::numeric::quantize_money;

/// Maps (account, liquidity role, base amount) to a fee
pub trait FeeCalculator: Send + Sync {
    fn fee(&self, account: &Account, liquidity: Liquidity, base: Decimal) -> Decimal;
}

/// VIP-tiered schedule with per-account overrides
#[derive(Debug, Clone)]
pub struct TieredFeeCalculator {
    tiers: Vec<FeeTier>,
}

impl TieredFeeCalculator {
    pub fn new(mut tiers: Vec<FeeTier>) -> Self {
        tiers.sort_by_key(|t| t.vip_level);
        Self { tiers }
    }

    /// Rate applying to `account` in the given role
    pub fn rate(&self, account: &Account, liquidity: Liquidity) -> Decimal {
        if let Some(fee_override) = &account.fee_override {
            return match liquidity {
                Liquidity::Maker => fee_override.maker_rate,
                Liquidity::Taker => fee_override.taker_rate,
            };
        }
        self.tiers
            .iter()
            .rev()
            .find(|t| t.vip_level <= account.vip_level)
            .or_else(|| self.tiers.first())
            .map_or(Decimal::ZERO, |t| t.rate(liquidity))
    }
}

impl FeeCalculator for TieredFeeCalculator {
    fn fee(&self, account: &Account, liquidity: Liquidity, base: Decimal) -> Decimal {
        quantize_money(base * self.rate(account, liquidity))
    }
}
