//! Ledger invariant tests
//!
//! Random delta sequences against the in-memory store:
//! - A commit applies fully or not at all
//! - Balance always equals the sum of committed rows
//! - Balances never go negative without `allow_negative`
//! - Replayed references change nothing

use ledger::{LedgerBatch, LedgerError, LedgerStore, LedgerWriter, MemoryLedger, RecordingAlerts};
use proptest::prelude::*;
use rust_decimal::Decimal;
use types::ids::{AccountId, TradeId};
use types::wallet::{RefModule, Reference, TransactionType};
use uuid::Uuid;

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

fn fresh_reference() -> Reference {
    Reference::new(RefModule::Manual, Uuid::now_v7())
}

proptest! {
    #[test]
    fn prop_commit_is_atomic_and_balanced(
        initial in 0i64..100_000,
        batches in prop::collection::vec(prop::collection::vec(-50_000i64..50_000, 0..6), 1..20),
    ) {
        let ledger = MemoryLedger::new();
        let alerts = RecordingAlerts::new();
        let wallet = ledger.fund(AccountId::new(), "USDT", cents(initial)).unwrap();
        let mut writer = LedgerWriter::new(wallet.clone());
        let mut expected = cents(initial);

        for deltas in batches {
            for delta in &deltas {
                writer.add(TransactionType::Manual, cents(*delta), "delta", fresh_reference());
            }
            let sum: Decimal = deltas.iter().map(|d| cents(*d)).sum();
            let before = ledger.transactions(wallet.wallet_id).unwrap().len();

            match writer.commit(&ledger, &alerts, false) {
                Ok(rows) => {
                    prop_assert!(expected + sum >= Decimal::ZERO);
                    prop_assert_eq!(rows.len(), deltas.len());
                    expected += sum;
                }
                Err(LedgerError::InsufficientBalance { .. }) => {
                    prop_assert!(expected + sum < Decimal::ZERO);
                    let after = ledger.transactions(wallet.wallet_id).unwrap().len();
                    prop_assert_eq!(before, after);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }

            let stored = ledger.wallet(wallet.wallet_id).unwrap();
            prop_assert_eq!(stored.balance, expected);
            prop_assert_eq!(writer.running_total(), expected);
            prop_assert!(stored.balance >= Decimal::ZERO);
        }

        prop_assert!(ledger.reconcile(wallet.wallet_id).unwrap().is_balanced());
    }

    #[test]
    fn prop_batch_all_or_nothing(
        balances in prop::collection::vec(0i64..10_000, 2..6),
        debits in prop::collection::vec(0i64..12_000, 2..6),
    ) {
        let ledger = MemoryLedger::new();
        let alerts = RecordingAlerts::new();
        let wallets: Vec<_> = balances
            .iter()
            .map(|b| ledger.fund(AccountId::new(), "BTC", cents(*b)).unwrap())
            .collect();
        let trade_id = TradeId::new();

        let mut batch = LedgerBatch::new();
        let mut solvent = true;
        for (i, (wallet, debit)) in wallets.iter().zip(debits.iter()).enumerate() {
            let module = [
                RefModule::TradeSellA,
                RefModule::TradeSellB,
                RefModule::TradeBuyA,
                RefModule::TradeBuyB,
                RefModule::TradeFeeA,
            ][i];
            batch.writer(wallet).add(
                TransactionType::Withdraw,
                -cents(*debit),
                "debit",
                Reference::trade(module, trade_id),
            );
            solvent &= debit <= &balances[i];
        }

        let result = batch.commit(&ledger, &alerts);
        prop_assert_eq!(result.is_ok(), solvent);

        for (i, wallet) in wallets.iter().enumerate() {
            let stored = ledger.wallet(wallet.wallet_id).unwrap();
            let expected = if solvent && i < debits.len() {
                cents(balances[i] - debits[i])
            } else {
                cents(balances[i])
            };
            prop_assert_eq!(stored.balance, expected);
            prop_assert!(ledger.reconcile(wallet.wallet_id).unwrap().is_balanced());
        }
    }
}

#[test]
fn test_replayed_batch_is_rejected_without_effect() {
    let ledger = MemoryLedger::new();
    let alerts = RecordingAlerts::new();
    let wallet = ledger.fund(AccountId::new(), "USDT", Decimal::from(10)).unwrap();
    let trade_id = TradeId::new();

    let build = |wallet: &types::wallet::Wallet| {
        let mut batch = LedgerBatch::new();
        batch.writer(wallet).add(
            TransactionType::Buy,
            Decimal::from(-4),
            "buy",
            Reference::trade(RefModule::TradeBuyA, trade_id),
        );
        batch
    };

    build(&wallet).commit(&ledger, &alerts).unwrap();
    let err = build(&wallet).commit(&ledger, &alerts).unwrap_err();

    assert!(err.is_duplicate());
    assert_eq!(ledger.wallet(wallet.wallet_id).unwrap().balance, Decimal::from(6));
    assert!(alerts.is_empty(), "replays are not operator alerts");
}

#[test]
fn test_concurrent_commits_never_overdraw() {
    use std::sync::Arc;
    use std::thread;

    let ledger = Arc::new(MemoryLedger::new());
    let wallet = ledger.fund(AccountId::new(), "USDT", Decimal::from(100)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let wallet = wallet.clone();
            thread::spawn(move || {
                let alerts = RecordingAlerts::new();
                let mut ok = 0;
                for _ in 0..10 {
                    let fresh = ledger.wallet(wallet.wallet_id).unwrap();
                    let mut writer = LedgerWriter::new(fresh);
                    writer.add(TransactionType::Withdraw, Decimal::from(-3), "spend", fresh_reference());
                    if writer.commit(&*ledger, &alerts, false).is_ok() {
                        ok += 1;
                    }
                }
                ok
            })
        })
        .collect();

    let committed: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let balance = ledger.wallet(wallet.wallet_id).unwrap().balance;

    assert_eq!(committed, 33);
    assert_eq!(balance, Decimal::from(1));
    assert!(ledger.reconcile(wallet.wallet_id).unwrap().is_balanced());
}
