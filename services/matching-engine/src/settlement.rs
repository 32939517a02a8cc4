//! Trade settlement
//!
//! Turns a matched [`Trade`] into ledger postings and commits all of them as
//! one [`LedgerBatch`]:
//!
//! | Reference    | Wallet             | Delta                  |
//! |--------------|--------------------|------------------------|
//! | `TradeSellA` | seller, source     | `-amount`              |
//! | `TradeBuyA`  | buyer, destination | `-price × amount`      |
//! | `TradeSellB` | seller, destination| `+price × amount - fee`|
//! | `TradeBuyB`  | buyer, source      | `+amount - fee`        |
//! | `TradeFeeA`  | fee, source        | `+buyer fee`           |
//! | `TradeFeeB`  | fee, destination   | `+seller fee`          |
//!
//! Fee rows are only written for non-zero fees. Every reference carries the
//! trade id, so replaying a settled trade is rejected by the store. Callers
//! that record the trade elsewhere do so through [`Settlement::settle_with`],
//! inside the same atomic commit.

use thiserror::Error;
use tracing::{debug, warn};
use types::ids::{AccountId, TradeId, TransactionId, WalletId};
use types::market::Market;
use types::numeric::money_is_zero;
use types::trade::{Trade, TradePostings};
use types::wallet::{RefModule, Reference, Transaction, TransactionType};

use ledger::{AlertSink, BatchReceipt, LedgerBatch, LedgerError, LedgerStore};

/// Settlement failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    /// The trade's postings are already committed; nothing was applied
    #[error("trade {0} is already settled")]
    AlreadySettled(TradeId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Committed postings of one trade
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReceipt {
    pub postings: TradePostings,
    /// Wallets whose balance changed
    pub touched: Vec<WalletId>,
    pub transactions: Vec<Transaction>,
}

/// Writes trades to the ledger
pub struct Settlement<'a> {
    ledger: &'a dyn LedgerStore,
    alerts: &'a dyn AlertSink,
    fee_account: AccountId,
}

impl<'a> Settlement<'a> {
    pub fn new(ledger: &'a dyn LedgerStore, alerts: &'a dyn AlertSink, fee_account: AccountId) -> Self {
        Self {
            ledger,
            alerts,
            fee_account,
        }
    }

    /// Commit every posting of `trade` or none of them
    pub fn settle(&self, trade: &Trade, market: &Market) -> Result<SettlementReceipt, SettlementError> {
        self.settle_with(trade, market, |_| Ok(()))
    }

    /// [`settle`](Self::settle) with `on_commit` joined to the ledger commit.
    ///
    /// If `on_commit` fails no posting is applied and its error is returned.
    pub fn settle_with<F>(
        &self,
        trade: &Trade,
        market: &Market,
        mut on_commit: F,
    ) -> Result<SettlementReceipt, SettlementError>
    where
        F: FnMut(&SettlementReceipt) -> Result<(), LedgerError>,
    {
        let src = market.src_currency.as_str();
        let dst = market.dst_currency.as_str();
        let amount = trade.amount.as_decimal();
        let total = trade.total_price();
        let id = trade.trade_id;
        let symbol = trade.symbol.as_str();

        let mut batch = LedgerBatch::new();
        let seller_src = self.ledger.wallet_for(trade.sell_account_id, src)?;
        let seller_dst = self.ledger.wallet_for(trade.sell_account_id, dst)?;
        let buyer_src = self.ledger.wallet_for(trade.buy_account_id, src)?;
        let buyer_dst = self.ledger.wallet_for(trade.buy_account_id, dst)?;

        batch.writer(&seller_src).add(
            TransactionType::Sell,
            -amount,
            format!("Sell {amount} {src} on {symbol}"),
            Reference::trade(RefModule::TradeSellA, id),
        );
        batch.writer(&buyer_dst).add(
            TransactionType::Buy,
            -total,
            format!("Pay {total} {dst} on {symbol}"),
            Reference::trade(RefModule::TradeBuyA, id),
        );
        batch.writer(&seller_dst).add(
            TransactionType::Sell,
            total - trade.sell_fee,
            format!("Receive {dst} on {symbol}"),
            Reference::trade(RefModule::TradeSellB, id),
        );
        batch.writer(&buyer_src).add(
            TransactionType::Buy,
            amount - trade.buy_fee,
            format!("Receive {src} on {symbol}"),
            Reference::trade(RefModule::TradeBuyB, id),
        );

        if !money_is_zero(trade.buy_fee) {
            let fee_src = self.ledger.wallet_for(self.fee_account, src)?;
            batch.writer(&fee_src).add(
                TransactionType::Fee,
                trade.buy_fee,
                format!("Buyer fee on {symbol}"),
                Reference::trade(RefModule::TradeFeeA, id),
            );
        }
        if !money_is_zero(trade.sell_fee) {
            let fee_dst = self.ledger.wallet_for(self.fee_account, dst)?;
            batch.writer(&fee_dst).add(
                TransactionType::Fee,
                trade.sell_fee,
                format!("Seller fee on {symbol}"),
                Reference::trade(RefModule::TradeFeeB, id),
            );
        }

        let mut settled = None;
        let committed = batch.commit_with(self.ledger, self.alerts, |rows| {
            let receipt = settlement_receipt(rows, id)?;
            on_commit(&receipt)?;
            settled = Some(receipt);
            Ok(())
        });
        match committed {
            Ok(_) => {}
            Err(err) if err.is_duplicate() => {
                warn!(trade_id = %id, "Trade postings already committed");
                return Err(SettlementError::AlreadySettled(id));
            }
            Err(err) => return Err(err.into()),
        }
        let receipt = settled.ok_or_else(|| LedgerError::Storage(format!("no receipt for trade {id}")))?;

        debug!(
            trade_id = %id,
            symbol = %trade.symbol,
            rows = receipt.transactions.len(),
            "Trade settled"
        );
        Ok(receipt)
    }
}

fn settlement_receipt(rows: &BatchReceipt, id: TradeId) -> Result<SettlementReceipt, LedgerError> {
    let postings = TradePostings {
        sell_withdraw: posting(rows, RefModule::TradeSellA, id)?,
        buy_withdraw: posting(rows, RefModule::TradeBuyA, id)?,
        sell_deposit: posting(rows, RefModule::TradeSellB, id)?,
        buy_deposit: posting(rows, RefModule::TradeBuyB, id)?,
        sell_fee: find_posting(rows, RefModule::TradeFeeB, id),
        buy_fee: find_posting(rows, RefModule::TradeFeeA, id),
    };

    let mut touched: Vec<WalletId> = rows.transactions.iter().map(|t| t.wallet_id).collect();
    touched.sort();
    touched.dedup();

    Ok(SettlementReceipt {
        postings,
        touched,
        transactions: rows.transactions.clone(),
    })
}

fn find_posting(receipt: &BatchReceipt, module: RefModule, id: TradeId) -> Option<TransactionId> {
    receipt
        .find(&Reference::trade(module, id))
        .map(|t| t.transaction_id)
}

fn posting(receipt: &BatchReceipt, module: RefModule, id: TradeId) -> Result<TransactionId, LedgerError> {
    find_posting(receipt, module, id)
        .ok_or_else(|| LedgerError::Storage(format!("no {module:?} row committed for trade {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{MemoryLedger, RecordingAlerts};
    use rust_decimal::Decimal;
    use types::ids::{MarketId, OrderId};
    use types::numeric::{Price, Quantity};
    use types::order::Side;

    struct Fixture {
        ledger: MemoryLedger,
        alerts: RecordingAlerts,
        fee_account: AccountId,
        seller: AccountId,
        buyer: AccountId,
    }

    fn fixture() -> Fixture {
        let ledger = MemoryLedger::new();
        let seller = AccountId::new();
        let buyer = AccountId::new();
        ledger.fund(seller, "BTC", Decimal::ONE).unwrap();
        ledger.fund(buyer, "USDT", Decimal::from(1000)).unwrap();
        Fixture {
            ledger,
            alerts: RecordingAlerts::new(),
            fee_account: AccountId::new(),
            seller,
            buyer,
        }
    }

    fn trade(f: &Fixture, amount: &str, buy_fee: Decimal, sell_fee: Decimal) -> Trade {
        Trade::new(
            1,
            MarketId::new("BTC/USDT"),
            OrderId::new(),
            OrderId::new(),
            f.buyer,
            f.seller,
            Side::SELL,
            Price::from_u64(1000),
            Quantity::from_str(amount).unwrap(),
            buy_fee,
            sell_fee,
            1,
        )
    }

    fn balance(f: &Fixture, account: AccountId, currency: &str) -> Decimal {
        f.ledger
            .find_wallet(account, currency)
            .unwrap()
            .map_or(Decimal::ZERO, |w| w.balance)
    }

    #[test]
    fn test_settle_moves_funds_and_fees() {
        let f = fixture();
        let settlement = Settlement::new(&f.ledger, &f.alerts, f.fee_account);
        let buy_fee = Decimal::new(1, 3); // 0.001 BTC
        let sell_fee = Decimal::ONE; // 1 USDT
        let trade = trade(&f, "0.5", buy_fee, sell_fee);

        let receipt = settlement.settle(&trade, &Market::new("BTC", "USDT")).unwrap();
        assert_eq!(receipt.transactions.len(), 6);
        assert_eq!(receipt.touched.len(), 6);
        assert!(receipt.postings.buy_fee.is_some());
        let net: Decimal = receipt.transactions.iter().map(|t| t.amount).sum();
        assert_eq!(net, Decimal::ZERO, "postings balance out");

        assert_eq!(balance(&f, f.seller, "BTC"), Decimal::new(5, 1));
        assert_eq!(balance(&f, f.seller, "USDT"), Decimal::from(499));
        assert_eq!(balance(&f, f.buyer, "USDT"), Decimal::from(500));
        assert_eq!(balance(&f, f.buyer, "BTC"), Decimal::new(499, 3));
        assert_eq!(balance(&f, f.fee_account, "BTC"), buy_fee);
        assert_eq!(balance(&f, f.fee_account, "USDT"), sell_fee);
    }

    #[test]
    fn test_zero_fees_write_no_fee_rows() {
        let f = fixture();
        let settlement = Settlement::new(&f.ledger, &f.alerts, f.fee_account);
        let trade = trade(&f, "0.1", Decimal::ZERO, Decimal::ZERO);

        let receipt = settlement.settle(&trade, &Market::new("BTC", "USDT")).unwrap();
        assert_eq!(receipt.transactions.len(), 4);
        assert_eq!(receipt.postings.buy_fee, None);
        assert_eq!(receipt.postings.sell_fee, None);
        assert!(f.ledger.find_wallet(f.fee_account, "BTC").unwrap().is_none());
    }

    #[test]
    fn test_replay_is_already_settled() {
        let f = fixture();
        let settlement = Settlement::new(&f.ledger, &f.alerts, f.fee_account);
        let trade = trade(&f, "0.5", Decimal::ZERO, Decimal::ONE);
        let market = Market::new("BTC", "USDT");

        settlement.settle(&trade, &market).unwrap();
        let err = settlement.settle(&trade, &market).unwrap_err();
        assert_eq!(err, SettlementError::AlreadySettled(trade.trade_id));
        assert_eq!(balance(&f, f.seller, "BTC"), Decimal::new(5, 1));
        assert!(f.alerts.is_empty(), "replays are not operator alerts");
    }

    #[test]
    fn test_failed_commit_hook_applies_nothing() {
        let f = fixture();
        let settlement = Settlement::new(&f.ledger, &f.alerts, f.fee_account);
        let trade = trade(&f, "0.5", Decimal::ZERO, Decimal::ONE);
        let market = Market::new("BTC", "USDT");

        let err = settlement
            .settle_with(&trade, &market, |receipt| {
                assert_eq!(receipt.transactions.len(), 5);
                Err(LedgerError::Aborted("trade not recorded".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, SettlementError::Ledger(LedgerError::Aborted(_))));
        assert_eq!(balance(&f, f.seller, "BTC"), Decimal::ONE);
        assert_eq!(balance(&f, f.buyer, "USDT"), Decimal::from(1000));

        // nothing was committed, so the same trade still settles
        let receipt = settlement.settle(&trade, &market).unwrap();
        assert_eq!(receipt.transactions.len(), 5);
        assert_eq!(balance(&f, f.seller, "BTC"), Decimal::new(5, 1));
    }

    #[test]
    fn test_insufficient_funds_applies_nothing() {
        let f = fixture();
        let settlement = Settlement::new(&f.ledger, &f.alerts, f.fee_account);
        let trade = trade(&f, "2", Decimal::ZERO, Decimal::ZERO);

        let err = settlement.settle(&trade, &Market::new("BTC", "USDT")).unwrap_err();
        assert!(matches!(err, SettlementError::Ledger(LedgerError::InsufficientBalance { .. })));
        assert_eq!(balance(&f, f.seller, "BTC"), Decimal::ONE);
        assert_eq!(balance(&f, f.buyer, "USDT"), Decimal::from(1000));
        assert_eq!(f.alerts.len(), 1);
    }
}
