//! Matching logic module
//!
//! Price/time priority, crossing rules and trade construction

pub mod crossing;
pub mod executor;

pub use crossing::{can_match, maker_side, orders_cross};
pub use executor::{MatchError, MatchExecutor};
