//! Per-market matching round
//!
//! One round walks the active orders of a single market: sells by ascending
//! price, buys by descending price, market orders first. Every candidate pair
//! goes through the forbidden-pair policy and balance validation before it is
//! priced, clamped to what both wallets hold, charged fees and settled.
//!
//! **Key Invariants:**
//! - A trade, its ledger postings and the fill state of both orders commit
//!   together or not at all
//! - A failed settlement leaves both orders exactly as they were
//! - Fill counters only ever grow, and never past the order amount

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use types::account::Account;
use types::clock::now_nanos;
use types::errors::{NumericError, OrderError};
use types::fee::Liquidity;
use types::ids::{AccountId, MarketId, OrderId};
use types::market::Market;
use types::numeric::{money_is_zero, round_down, Quantity};
use types::order::{CancelReason, Order, Side};
use types::trade::Trade;

use ledger::{Alert, AlertSink, LedgerError, LedgerStore};

use crate::config::{CycleConfig, EngineConfig};
use crate::events::MatcherEvent;
use crate::fees::FeeCalculator;
use crate::forbidden::ForbiddenPairChecker;
use crate::matching::crossing::{maker_side, orders_cross, sort_buys, sort_sells};
use crate::matching::{MatchError, MatchExecutor};
use crate::settlement::{Settlement, SettlementError};
use crate::store::{AccountDirectory, OrderStore, StoreError};
use crate::validation::{OrderValidator, Validation};

/// Errors that abort a market round
#[derive(Error, Debug)]
pub enum MatcherError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Collaborators shared by every matcher of a cycle
#[derive(Clone, Copy)]
pub struct MatcherDeps<'a> {
    pub config: &'a EngineConfig,
    pub cycle: &'a CycleConfig,
    pub ledger: &'a dyn LedgerStore,
    pub orders: &'a dyn OrderStore,
    pub accounts: &'a dyn AccountDirectory,
    pub fees: &'a dyn FeeCalculator,
    pub alerts: &'a dyn AlertSink,
    pub executor: &'a MatchExecutor,
}

/// Outcome of one market round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub symbol: MarketId,
    /// Settled trades
    pub matches: usize,
    /// Pairs rejected by validation or policy
    pub failures: usize,
    /// Pairs whose settlement failed; their orders wait for the next cycle
    pub skipped: usize,
    pub canceled: usize,
    /// Matching stopped at the per-round trade cap
    pub trade_cap_reached: bool,
    pub trades: Vec<Trade>,
    pub events: Vec<MatcherEvent>,
}

impl RoundReport {
    fn new(symbol: MarketId) -> Self {
        Self {
            symbol,
            matches: 0,
            failures: 0,
            skipped: 0,
            canceled: 0,
            trade_cap_reached: false,
            trades: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// What became of one crossing pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOutcome {
    Settled,
    /// An order was canceled or the pair was refused before settlement
    Rejected,
    /// Settlement failed; both orders wait for the next cycle
    Failed,
}

/// Matches the markets of one lane, one market at a time.
///
/// The validated-order cache lives as long as the matcher, so one matcher is
/// created per lane per cycle.
pub struct Matcher<'a> {
    deps: MatcherDeps<'a>,
    validator: OrderValidator<'a>,
}

impl<'a> Matcher<'a> {
    pub fn new(deps: MatcherDeps<'a>) -> Self {
        Self {
            deps,
            validator: OrderValidator::new(deps.ledger, deps.config.market_buy_range_allowance),
        }
    }

    /// Run one matching round over the active orders of `market`
    pub fn run_round(&mut self, market: &Market) -> Result<RoundReport, MatcherError> {
        let mut report = RoundReport::new(market.symbol.clone());
        let orders = self.deps.orders.active_orders(&market.symbol)?;
        // Last persisted version of every order
        let mut versions: HashMap<OrderId, u64> = orders.iter().map(|o| (o.order_id, o.version)).collect();

        let (mut sells, mut buys): (Vec<Order>, Vec<Order>) =
            orders.into_iter().filter(Order::is_active).partition(Order::is_sell);
        sort_sells(&mut sells);
        sort_buys(&mut buys);
        debug!(symbol = %market.symbol, sells = sells.len(), buys = buys.len(), "Round started");

        let checker = ForbiddenPairChecker::from_config(self.deps.cycle);
        let max_trades = self.deps.cycle.max_trades_per_round;
        // Orders of a failed settlement sit out the rest of the round
        let mut held: HashSet<OrderId> = HashSet::new();

        'sells: for sell in sells.iter_mut() {
            for buy in buys.iter_mut() {
                if report.trades.len() >= max_trades {
                    report.trade_cap_reached = true;
                    break 'sells;
                }
                if !sell.is_active() || sell.is_matched() || held.contains(&sell.order_id) {
                    break;
                }
                if !buy.is_active() || buy.is_matched() || held.contains(&buy.order_id) {
                    continue;
                }
                if buy.is_market() && sell.is_market() {
                    continue;
                }
                if !orders_cross(buy, sell) {
                    break 'sells;
                }

                let seller = self.deps.accounts.account(sell.account_id);
                let buyer = self.deps.accounts.account(buy.account_id);
                if let Some(reason) = checker.check(&seller, &buyer) {
                    info!(
                        sell_order_id = %sell.order_id,
                        buy_order_id = %buy.order_id,
                        reason = ?reason,
                        "Forbidden pair"
                    );
                    cancel(sell, CancelReason::ForbiddenPair, &mut report)?;
                    cancel(buy, CancelReason::ForbiddenPair, &mut report)?;
                    report.failures += 1;
                    break;
                }

                if let Validation::Invalid(reason) = self.validator.validate(buy, market)? {
                    cancel(buy, reason, &mut report)?;
                    report.failures += 1;
                    continue;
                }
                if let Validation::Invalid(reason) = self.validator.validate(sell, market)? {
                    cancel(sell, reason, &mut report)?;
                    report.failures += 1;
                    break;
                }

                match self.match_pair(market, buy, sell, &buyer, &seller, &mut report)? {
                    PairOutcome::Settled => {
                        versions.insert(buy.order_id, buy.version);
                        versions.insert(sell.order_id, sell.version);
                    }
                    PairOutcome::Failed => {
                        held.insert(buy.order_id);
                        held.insert(sell.order_id);
                    }
                    PairOutcome::Rejected => {}
                }
            }
        }

        if !report.trade_cap_reached {
            for order in sells.iter_mut().chain(buys.iter_mut()) {
                if order.is_market() && order.is_active() && !held.contains(&order.order_id) {
                    cancel(order, CancelReason::UnfilledMarketOrder, &mut report)?;
                }
            }
        } else {
            warn!(symbol = %market.symbol, max_trades, "Trade cap reached, deferring to next cycle");
        }

        let changed: Vec<Order> = sells
            .into_iter()
            .chain(buys)
            .filter(|o| versions.get(&o.order_id) != Some(&o.version))
            .collect();
        if !changed.is_empty() {
            self.deps.orders.update_orders(&changed)?;
        }

        info!(
            symbol = %market.symbol,
            matches = report.matches,
            failures = report.failures,
            skipped = report.skipped,
            canceled = report.canceled,
            "Round finished"
        );
        Ok(report)
    }

    /// Price, clamp, charge and settle one crossing pair.
    ///
    /// On success `buy` and `sell` carry their new fill state, which the
    /// order store already holds.
    fn match_pair(
        &mut self,
        market: &Market,
        buy: &mut Order,
        sell: &mut Order,
        buyer: &Account,
        seller: &Account,
        report: &mut RoundReport,
    ) -> Result<PairOutcome, MatcherError> {
        let maker = maker_side(buy, sell);
        let maker_price = match maker {
            Side::SELL => sell.price,
            Side::BUY => buy.price,
        };
        let price = match maker_price {
            Some(price) if !money_is_zero(price.as_decimal()) => price,
            _ => {
                warn!(buy_order_id = %buy.order_id, sell_order_id = %sell.order_id, "Zero match price");
                cancel(buy, CancelReason::ZeroPrice, report)?;
                cancel(sell, CancelReason::ZeroPrice, report)?;
                return Ok(PairOutcome::Rejected);
            }
        };

        let mut amount = buy.unmatched_amount().min(sell.unmatched_amount());

        let buyer_balance = self.available(buy.account_id, &market.dst_currency)?;
        let affordable = Quantity::try_new(round_down(
            buyer_balance / price.as_decimal(),
            market.amount_precision,
        ))?;
        if amount > affordable {
            amount = affordable;
            if amount.is_zero() {
                cancel(buy, CancelReason::InsufficientBalance, report)?;
                return Ok(PairOutcome::Rejected);
            }
        }

        let seller_balance = self.available(sell.account_id, &market.src_currency)?;
        if amount.as_decimal() > seller_balance {
            amount = Quantity::try_new(round_down(seller_balance, market.amount_precision))?;
            if amount.is_zero() {
                cancel(sell, CancelReason::InsufficientBalance, report)?;
                return Ok(PairOutcome::Rejected);
            }
        }

        let max_diff = self.deps.config.market_order_max_price_diff;
        if let (true, Some(guard)) = (buy.is_market(), buy.price) {
            if price.as_decimal() > guard.as_decimal() * (Decimal::ONE + max_diff) {
                debug!(order_id = %buy.order_id, %price, %guard, "Market buy outside guard price");
                cancel(buy, CancelReason::UnexpectedPrice, report)?;
                return Ok(PairOutcome::Rejected);
            }
        }
        if let (true, Some(guard)) = (sell.is_market(), sell.price) {
            if price.as_decimal() < guard.as_decimal() * (Decimal::ONE - max_diff) {
                debug!(order_id = %sell.order_id, %price, %guard, "Market sell outside guard price");
                cancel(sell, CancelReason::UnexpectedPrice, report)?;
                return Ok(PairOutcome::Rejected);
            }
        }

        let (buyer_role, seller_role) = match maker {
            Side::BUY => (Liquidity::Maker, Liquidity::Taker),
            Side::SELL => (Liquidity::Taker, Liquidity::Maker),
        };
        let buy_fee = self.deps.fees.fee(buyer, buyer_role, amount.as_decimal());
        let sell_fee = self
            .deps
            .fees
            .fee(seller, seller_role, amount.as_decimal() * price.as_decimal());

        let now = now_nanos();
        let trade =
            self.deps
                .executor
                .execute_trade(&market.symbol, buy, sell, price, amount, buy_fee, sell_fee, now)?;

        let mut filled_buy = buy.clone();
        filled_buy.add_fill(amount, price, buy_fee, now)?;
        let mut filled_sell = sell.clone();
        filled_sell.add_fill(amount, price, sell_fee, now)?;

        // The trade row and both orders are written inside the ledger commit
        let orders = self.deps.orders;
        let fills = [(&filled_buy, buy.version), (&filled_sell, sell.version)];
        let mut recorded = None;
        let settlement = Settlement::new(self.deps.ledger, self.deps.alerts, self.deps.config.fee_account);
        let settled = settlement.settle_with(&trade, market, |receipt| {
            let mut settled = trade.clone();
            settled.settle(receipt.postings.clone(), now_nanos());
            orders
                .record_fill(&settled, &fills)
                .map_err(|err| LedgerError::Aborted(err.to_string()))?;
            recorded = Some(settled);
            Ok(())
        });

        let receipt = match settled {
            Ok(receipt) => receipt,
            Err(SettlementError::AlreadySettled(trade_id)) => {
                error!(
                    %trade_id,
                    buy_order_id = %buy.order_id,
                    sell_order_id = %sell.order_id,
                    "Postings of this crossing already committed, orders need reconciliation"
                );
                self.deps.alerts.notify(Alert::new(
                    "trade already settled",
                    format!("trade {trade_id} on {} was settled before its orders were updated", market.symbol),
                ));
                report.skipped += 1;
                return Ok(PairOutcome::Failed);
            }
            Err(err) => {
                warn!(
                    trade_id = %trade.trade_id,
                    buy_order_id = %buy.order_id,
                    sell_order_id = %sell.order_id,
                    error = %err,
                    "Settlement failed, orders left for next cycle"
                );
                report.skipped += 1;
                return Ok(PairOutcome::Failed);
            }
        };
        let trade = recorded.ok_or_else(|| LedgerError::Storage(format!("trade {} not recorded", trade.trade_id)))?;

        for wallet_id in &receipt.touched {
            self.validator.invalidate_wallet(*wallet_id);
        }
        *buy = filled_buy;
        *sell = filled_sell;

        info!(
            trade_id = %trade.trade_id,
            symbol = %market.symbol,
            price = %price,
            amount = %amount,
            maker_order_id = %trade.maker_order_id(),
            taker_order_id = %trade.taker_order_id(),
            "Trade settled"
        );
        report.events.push(MatcherEvent::trade_settled(&trade));
        for order in [&*buy, &*sell] {
            if !order.is_active() {
                report.events.push(MatcherEvent::order_done(order));
            }
        }
        report.matches += 1;
        report.trades.push(trade);
        Ok(PairOutcome::Settled)
    }

    /// Available balance of the account's wallet, zero when it has none
    fn available(&self, account_id: AccountId, currency: &str) -> Result<Decimal, LedgerError> {
        Ok(self
            .deps
            .ledger
            .find_wallet(account_id, currency)?
            .map_or(Decimal::ZERO, |w| w.available()))
    }
}

fn cancel(order: &mut Order, reason: CancelReason, report: &mut RoundReport) -> Result<(), OrderError> {
    order.cancel(reason, now_nanos())?;
    debug!(order_id = %order.order_id, reason = ?reason, "Order canceled");
    report.canceled += 1;
    report.events.push(MatcherEvent::order_canceled(order, reason));
    Ok(())
}
