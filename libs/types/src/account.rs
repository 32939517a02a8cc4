//! Account types
//!
//! Balances live in wallets (see [`crate::wallet`]); an account only carries
//! what the matcher needs to classify and price its trades.

use crate::ids::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    /// Active and can trade
    ACTIVE,
    /// Temporarily suspended
    SUSPENDED,
    /// Permanently closed
    CLOSED,
}

/// Behavioral flags attached to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountFlag {
    /// Market-making or liquidity bot operated by the exchange
    AutomatedTrader,
}

/// Per-account fee rates that replace the VIP schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverride {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

/// Account structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub status: AccountStatus,
    pub vip_level: u8,
    pub flags: BTreeSet<AccountFlag>,
    pub fee_override: Option<FeeOverride>,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl Account {
    /// Create a new regular VIP-0 account
    pub fn new(timestamp: i64) -> Self {
        Self::with_id(AccountId::new(), timestamp)
    }

    /// Create a regular VIP-0 account under a known id
    pub fn with_id(account_id: AccountId, timestamp: i64) -> Self {
        Self {
            account_id,
            status: AccountStatus::ACTIVE,
            vip_level: 0,
            flags: BTreeSet::new(),
            fee_override: None,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    pub fn with_vip_level(mut self, vip_level: u8) -> Self {
        self.vip_level = vip_level;
        self
    }

    pub fn with_flag(mut self, flag: AccountFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn with_fee_override(mut self, fee_override: FeeOverride) -> Self {
        self.fee_override = Some(fee_override);
        self
    }

    pub fn has_flag(&self, flag: AccountFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_automated(&self) -> bool {
        self.has_flag(AccountFlag::AutomatedTrader)
    }

    /// Check if account is active
    pub fn is_active(&self) -> bool {
        matches!(self.status, AccountStatus::ACTIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new(1708123456789000000);
        assert_eq!(account.status, AccountStatus::ACTIVE);
        assert_eq!(account.vip_level, 0);
        assert!(account.is_active());
        assert!(!account.is_automated());
        assert!(account.fee_override.is_none());
    }

    #[test]
    fn test_account_flags() {
        let account = Account::new(1).with_flag(AccountFlag::AutomatedTrader).with_vip_level(3);
        assert!(account.is_automated());
        assert_eq!(account.vip_level, 3);
    }

    #[test]
    fn test_account_serialization() {
        let account = Account::new(1)
            .with_flag(AccountFlag::AutomatedTrader)
            .with_fee_override(FeeOverride {
                maker_rate: Decimal::ZERO,
                taker_rate: Decimal::from_str_exact("0.001").unwrap(),
            });
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("automated_trader"));
        let deserialized: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, deserialized);
    }
}
