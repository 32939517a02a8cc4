//! Types library for the spot matching and settlement core
//!
//! Core type definitions shared by the ledger and the matching engine.
//! All money is `rust_decimal`, all timestamps are unix nanoseconds.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, TradeId, AccountId, WalletId, MarketId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity) and rounding helpers
//! - `order`: Order lifecycle types
//! - `trade`: Trade execution types
//! - `account`: Account flags, VIP level and fee overrides
//! - `market`: Trading pair definition
//! - `wallet`: Wallets and ledger transactions
//! - `fee`: Fee schedule types
//! - `errors`: Error taxonomy
//! - `clock`: Timestamps

pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;
pub mod account;
pub mod market;
pub mod wallet;
pub mod fee;
pub mod errors;
pub mod clock;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::trade::*;
    pub use crate::account::*;
    pub use crate::market::*;
    pub use crate::wallet::*;
    pub use crate::fee::*;
    pub use crate::errors::*;
    pub use crate::clock::now_nanos;
}
