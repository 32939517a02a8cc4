//! Matching Engine Service
//!
//! Periodic matching and settlement of spot orders. Each cycle partitions the
//! active markets into lanes that share no wallet, matches every market of a
//! lane in price/time priority and settles each trade through the ledger
//! before it is recorded.
//!
//! **Key Invariants:**
//! - Markets run concurrently only when their lanes share no currency
//! - Every recorded trade has all of its ledger postings committed
//! - Bot accounts never trade with each other while internal trading is
//!   prevented
//! - Trade sequence numbers are unique and increasing across lanes

pub mod config;
pub mod engine;
pub mod events;
pub mod fees;
pub mod forbidden;
pub mod matcher;
pub mod matching;
pub mod partition;
pub mod settlement;
pub mod store;
pub mod validation;

pub use config::{ConfigError, CycleConfig, EngineConfig, MemorySettings, SettingsStore};
pub use engine::{CycleReport, EngineError, FailedMarket, LaneReport, MatchingEngine};
pub use events::MatcherEvent;
pub use fees::{FeeCalculator, TieredFeeCalculator};
pub use forbidden::{ForbiddenPairChecker, ForbiddenReason};
pub use matcher::{Matcher, MatcherDeps, MatcherError, RoundReport};
pub use partition::{Lane, MarketPartitioner, Partition, PartitionError};
pub use settlement::{Settlement, SettlementError, SettlementReceipt};
pub use store::{AccountDirectory, MemoryAccounts, MemoryOrderStore, OrderStore, StoreError};
pub use validation::{OrderValidator, Validation};
