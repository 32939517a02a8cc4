//! Unique identifier types for exchange entities
//!
//! Entity IDs use UUID v7 so they sort by creation time. Market symbols are
//! plain `SRC/DST` strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new time-sortable identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an order
    OrderId
);
uuid_id!(
    /// Unique identifier for a trade (one crossing of a buy and a sell order)
    ///
    /// Doubles as the reference id of every ledger posting the trade produces.
    TradeId
);
uuid_id!(
    /// Unique identifier for a user account
    AccountId
);
uuid_id!(
    /// Unique identifier for a (user, currency) wallet
    WalletId
);
uuid_id!(
    /// Unique identifier for a committed ledger row
    TransactionId
);

/// Namespace of match-derived trade ids
const MATCH_NAMESPACE: Uuid = Uuid::from_u128(0x1b4e_28ba_2fa1_51d2_883f_0016_d3cc_427e);

impl TradeId {
    /// Id of the crossing of `sell` and `buy` as read at the given versions.
    ///
    /// The same pair in the same state always maps to the same id, so a
    /// retried match reuses the posting references of the first attempt.
    pub fn for_match(sell: OrderId, sell_version: u64, buy: OrderId, buy_version: u64) -> Self {
        let mut name = [0u8; 48];
        name[..16].copy_from_slice(sell.0.as_bytes());
        name[16..24].copy_from_slice(&sell_version.to_be_bytes());
        name[24..40].copy_from_slice(buy.0.as_bytes());
        name[40..].copy_from_slice(&buy_version.to_be_bytes());
        Self(Uuid::new_v5(&MATCH_NAMESPACE, &name))
    }
}

/// Market identifier (trading pair)
///
/// Format: "SRC/DST" (e.g., "BTC/USDT", "ETH/IRT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string
    ///
    /// # Panics
    /// Panics if the format is invalid (must contain '/')
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(s.contains('/'), "MarketId must be in SRC/DST format");
        Self(s)
    }

    /// Try to create a MarketId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.contains('/') {
            Some(Self(s))
        } else {
            None
        }
    }

    /// Build the symbol of a currency pair
    pub fn from_pair(src_currency: &str, dst_currency: &str) -> Self {
        Self(format!("{src_currency}/{dst_currency}"))
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into source and destination currency codes
    pub fn split(&self) -> (&str, &str) {
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
