//! Forbidden-pair policy
//!
//! Two automated accounts must not trade with each other while internal
//! trading is prevented. An account counts as automated when it carries the
//! `AutomatedTrader` flag or is listed in the configured bot ids.

use std::collections::HashSet;
use types::account::Account;
use types::ids::AccountId;

use crate::config::CycleConfig;

/// Why a pair was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// Both sides are automated accounts
    InternalTrade,
}

/// Pure predicate over the two accounts of a candidate match
#[derive(Debug, Clone, Copy)]
pub struct ForbiddenPairChecker<'a> {
    prevent_internal_trade: bool,
    bot_ids: &'a HashSet<AccountId>,
}

impl<'a> ForbiddenPairChecker<'a> {
    pub fn new(prevent_internal_trade: bool, bot_ids: &'a HashSet<AccountId>) -> Self {
        Self {
            prevent_internal_trade,
            bot_ids,
        }
    }

    pub fn from_config(config: &'a CycleConfig) -> Self {
        Self::new(config.prevent_internal_trade, &config.trader_bot_ids)
    }

    pub fn is_automated(&self, account: &Account) -> bool {
        account.is_automated() || self.bot_ids.contains(&account.account_id)
    }

    /// `Some(reason)` when the seller and buyer must not be matched
    pub fn check(&self, seller: &Account, buyer: &Account) -> Option<ForbiddenReason> {
        if !self.prevent_internal_trade {
            return None;
        }
        if self.is_automated(seller) && self.is_automated(buyer) {
            return Some(ForbiddenReason::InternalTrade);
        }
        None
    }
}
