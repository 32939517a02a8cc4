//! Wallet ledger
//!
//! The only path that mutates wallet balances. Deltas are buffered per
//! wallet and committed through one atomic conditional update per batch.
//!
//! **Key Invariants:**
//! - A wallet's balance equals the sum of its committed transactions
//! - No wallet goes negative unless the commit explicitly allows it
//! - A (reference module, reference id) pair is committed at most once

pub mod alert;
pub mod batch;
pub mod error;
pub mod memory;
pub mod store;
pub mod writer;

pub use alert::{Alert, AlertSink, RecordingAlerts, TracingAlerts};
pub use batch::{BatchReceipt, LedgerBatch};
pub use error::LedgerError;
pub use memory::{MemoryLedger, Reconciliation};
pub use store::{CommitHook, CommitOutcome, Entry, LedgerStore, WalletUpdate};
pub use writer::LedgerWriter;
