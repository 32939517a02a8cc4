//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Monetary values are stored with at most [`MONEY_DECIMALS`] fractional
//! digits and rounded half-up; amounts clamped to a wallet balance are
//! rounded toward zero so a match never exceeds what the wallet holds.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::errors::NumericError;

/// Fractional digits kept on every ledger amount
pub const MONEY_DECIMALS: u32 = 10;

/// Round a monetary value to ledger precision (half-up)
pub fn quantize_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate a value to `decimals` fractional digits (toward zero)
pub fn round_down(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Whether a value is zero at ledger precision
pub fn money_is_zero(value: Decimal) -> bool {
    quantize_money(value).is_zero()
}

/// Strictly positive limit price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub fn try_new(value: Decimal) -> Result<Self, NumericError> {
        if value <= Decimal::ZERO {
            return Err(NumericError::NonPositivePrice(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, NumericError> {
        let value = Decimal::from_str(s).map_err(|_| NumericError::Parse(s.to_string()))?;
        Self::try_new(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, NumericError> {
        Self::try_new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Decimal {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Non-negative order or trade amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub fn try_new(value: Decimal) -> Result<Self, NumericError> {
        if value < Decimal::ZERO {
            return Err(NumericError::NegativeQuantity(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, NumericError> {
        let value = Decimal::from_str(s).map_err(|_| NumericError::Parse(s.to_string()))?;
        Self::try_new(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        money_is_zero(self.0)
    }

    /// Saturating subtraction; never goes below zero
    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Self((self.0 - other.0).max(Decimal::ZERO))
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, NumericError> {
        Self::try_new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(quantity: Quantity) -> Decimal {
        quantity.0
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_must_be_positive() {
        assert!(Price::try_new(Decimal::ZERO).is_err());
        assert!(Price::from_str("-1").is_err());
        assert_eq!(Price::from_str("61234").unwrap(), Price::from_u64(61234));
    }

    #[test]
    fn test_deserialize_validates() {
        let price: Price = serde_json::from_str(r#""61234.5""#).unwrap();
        assert_eq!(price, Price::from_str("61234.5").unwrap());
        assert_eq!(serde_json::to_string(&price).unwrap(), r#""61234.5""#);

        assert!(serde_json::from_str::<Price>(r#""0""#).is_err());
        assert!(serde_json::from_str::<Price>(r#""-3""#).is_err());
        assert!(serde_json::from_str::<Quantity>(r#""-0.1""#).is_err());
        assert!(serde_json::from_str::<Quantity>(r#""0""#).is_ok());
    }

    #[test]
    fn test_quantity_rejects_negative() {
        assert!(Quantity::try_new(Decimal::NEGATIVE_ONE).is_err());
        assert!(Quantity::from_str("abc").is_err());
    }

    #[test]
    fn test_quantity_arithmetic_saturates() {
        let a = Quantity::from_str("0.002").unwrap();
        let b = Quantity::from_str("0.005").unwrap();
        assert_eq!(a - b, Quantity::zero());
        assert_eq!((a + b).as_decimal(), Decimal::from_str("0.007").unwrap());
    }

    #[test]
    fn test_quantize_money_half_up() {
        let value = Decimal::from_str("0.00000000005").unwrap();
        assert_eq!(quantize_money(value), Decimal::from_str("0.0000000001").unwrap());
        assert!(money_is_zero(Decimal::from_str("0.00000000004").unwrap()));
    }

    #[test]
    fn test_round_down_truncates() {
        let value = Decimal::from_str("0.0019999").unwrap();
        assert_eq!(round_down(value, 4), Decimal::from_str("0.0019").unwrap());
    }

    proptest::proptest! {
        #[test]
        fn prop_round_down_never_exceeds(units in 0i64..i64::MAX / 4, scale in 0u32..16, decimals in 0u32..10) {
            let value = Decimal::new(units, scale);
            let rounded = round_down(value, decimals);
            proptest::prop_assert!(rounded <= value);
            proptest::prop_assert!(value - rounded < Decimal::new(1, decimals));
        }

        #[test]
        fn prop_quantize_is_idempotent(units in i64::MIN / 4..i64::MAX / 4, scale in 0u32..20) {
            let once = quantize_money(Decimal::new(units, scale));
            proptest::prop_assert_eq!(quantize_money(once), once);
        }
    }
}
