//! Matching cycle coordinator
//!
//! One cycle reads the settings snapshot, partitions the active markets into
//! lanes and runs them in three steps: the serial lane alone, then lanes A
//! and B side by side, then lanes C and D side by side. Each lane is a worker
//! thread with its own [`Matcher`]; markets inside a lane run one after the
//! other.

use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{error, info, info_span};
use types::ids::MarketId;
use types::market::Market;
use types::trade::Trade;

use ledger::{Alert, AlertSink, LedgerStore};

use crate::config::{ConfigError, CycleConfig, EngineConfig, SettingsStore};
use crate::events::MatcherEvent;
use crate::fees::TieredFeeCalculator;
use crate::matcher::{Matcher, MatcherDeps, RoundReport};
use crate::matching::MatchExecutor;
use crate::partition::{Lane, MarketPartitioner, PartitionError};
use crate::store::{AccountDirectory, OrderStore};

/// Errors fatal to a whole cycle
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("partitioning failed: {0}")]
    Partition(#[from] PartitionError),

    /// `completed` holds every lane that finished before the cycle stopped.
    /// Their trades are already committed.
    #[error("lane {lane} worker panicked")]
    LanePanicked {
        lane: &'static str,
        completed: Box<CycleReport>,
    },
}

/// A market whose round failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMarket {
    pub symbol: MarketId,
    pub error: String,
}

/// Rounds run by one lane
#[derive(Debug, Clone, PartialEq)]
pub struct LaneReport {
    pub lane: Lane,
    pub rounds: Vec<RoundReport>,
    pub failed_markets: Vec<FailedMarket>,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// The engine was disabled and did nothing
    pub skipped: bool,
    /// Lane reports in execution order
    pub lanes: Vec<LaneReport>,
}

impl CycleReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            lanes: Vec::new(),
        }
    }

    pub fn lane(&self, lane: Lane) -> Option<&LaneReport> {
        self.lanes.iter().find(|r| r.lane == lane)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &RoundReport> {
        self.lanes.iter().flat_map(|l| l.rounds.iter())
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.rounds().flat_map(|r| r.trades.iter())
    }

    pub fn events(&self) -> impl Iterator<Item = &MatcherEvent> {
        self.rounds().flat_map(|r| r.events.iter())
    }

    pub fn matches(&self) -> usize {
        self.rounds().map(|r| r.matches).sum()
    }

    pub fn failed_markets(&self) -> impl Iterator<Item = &FailedMarket> {
        self.lanes.iter().flat_map(|l| l.failed_markets.iter())
    }
}

/// Runs matching cycles over shared stores
pub struct MatchingEngine {
    config: EngineConfig,
    settings: Arc<dyn SettingsStore>,
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn LedgerStore>,
    accounts: Arc<dyn AccountDirectory>,
    alerts: Arc<dyn AlertSink>,
    /// Trade sequence shared by every lane
    executor: MatchExecutor,
}

impl MatchingEngine {
    pub fn new(
        config: EngineConfig,
        settings: Arc<dyn SettingsStore>,
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn LedgerStore>,
        accounts: Arc<dyn AccountDirectory>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let executor = MatchExecutor::new(config.starting_sequence);
        Self {
            config,
            settings,
            orders,
            ledger,
            accounts,
            alerts,
            executor,
        }
    }

    /// Run one matching cycle over `markets`.
    ///
    /// Inactive markets are ignored. Configuration and partitioning errors
    /// abort the cycle before any order is touched; a failing market only
    /// fails its own round. A panicking lane worker stops the cycle after its
    /// step, and the lanes that finished are returned inside the error.
    pub fn run_cycle(&self, markets: &[Market]) -> Result<CycleReport, EngineError> {
        let cycle = CycleConfig::load(self.settings.as_ref())?;
        if !cycle.enabled {
            info!("Matching engine disabled, skipping cycle");
            return Ok(CycleReport::skipped());
        }

        let active: Vec<Market> = markets.iter().filter(|m| m.is_active).cloned().collect();
        let partition = MarketPartitioner::from_config(&cycle).partition(&active)?;
        info!(
            markets = partition.len(),
            serial = partition.serial().len(),
            serial_only = cycle.serial_only,
            "Matching cycle started"
        );

        let fees = TieredFeeCalculator::new(cycle.fee_tiers.clone());
        let deps = MatcherDeps {
            config: &self.config,
            cycle: &cycle,
            ledger: self.ledger.as_ref(),
            orders: self.orders.as_ref(),
            accounts: self.accounts.as_ref(),
            fees: &fees,
            alerts: self.alerts.as_ref(),
            executor: &self.executor,
        };

        let mut report = CycleReport::default();
        for group in Lane::SCHEDULE {
            if let [lane] = group {
                report.lanes.push(run_lane(deps, *lane, partition.lane(*lane)));
                continue;
            }
            let partition = &partition;
            let joined = thread::scope(|scope| {
                let workers: Vec<_> = group
                    .iter()
                    .map(|&lane| (lane, scope.spawn(move || run_lane(deps, lane, partition.lane(lane)))))
                    .collect();
                workers
                    .into_iter()
                    .map(|(lane, worker)| (lane, worker.join()))
                    .collect::<Vec<_>>()
            });

            let mut panicked = None;
            for (lane, result) in joined {
                match result {
                    Ok(lane_report) => report.lanes.push(lane_report),
                    Err(_) => {
                        panicked.get_or_insert(lane);
                    }
                }
            }
            if let Some(lane) = panicked {
                return Err(self.lane_panicked(lane, report));
            }
        }

        info!(
            matches = report.matches(),
            failed_markets = report.failed_markets().count(),
            "Matching cycle finished"
        );
        Ok(report)
    }
}

impl MatchingEngine {
    fn lane_panicked(&self, lane: Lane, completed: CycleReport) -> EngineError {
        for trade in completed.trades() {
            info!(
                trade_id = %trade.trade_id,
                symbol = %trade.symbol,
                sequence = trade.sequence,
                "Trade committed before lane panic"
            );
        }
        error!(
            lane = lane.name(),
            matches = completed.matches(),
            "Lane worker panicked, cycle stopped"
        );
        self.alerts.notify(Alert::new(
            "lane worker panicked",
            format!(
                "lane {} panicked after {} committed matches this cycle",
                lane.name(),
                completed.matches()
            ),
        ));
        EngineError::LanePanicked {
            lane: lane.name(),
            completed: Box::new(completed),
        }
    }
}

fn run_lane(deps: MatcherDeps<'_>, lane: Lane, markets: &[Market]) -> LaneReport {
    let _lane = info_span!("lane", lane = lane.name()).entered();
    let mut matcher = Matcher::new(deps);
    let mut report = LaneReport {
        lane,
        rounds: Vec::with_capacity(markets.len()),
        failed_markets: Vec::new(),
    };

    for market in markets {
        let _market = info_span!("market", symbol = %market.symbol).entered();
        match matcher.run_round(market) {
            Ok(round) => report.rounds.push(round),
            Err(err) => {
                error!(symbol = %market.symbol, error = %err, "Matching round failed");
                deps.alerts.notify(Alert::new(
                    "matching round failed",
                    format!("{} in lane {}: {err}", market.symbol, lane.name()),
                ));
                report.failed_markets.push(FailedMarket {
                    symbol: market.symbol.clone(),
                    error: err.to_string(),
                });
            }
        }
    }
    report
}
