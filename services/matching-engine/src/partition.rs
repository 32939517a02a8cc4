//! Market partitioning
//!
//! Splits the active markets into five lanes `[serial, A, B, C, D]`. Lane 0
//! runs alone, then A and B run together, then C and D run together. Lanes
//! that run together never touch a common currency, so their ledger commits
//! never contend on a wallet.
//!
//! Markets are grouped by destination currency. The largest group ("big")
//! is bisected by source currency into A and C; every other market
//! ("little") goes to D when its source currency is one of A's, else to B.
//! Bridge markets, whose source currency is the destination of another
//! market, would couple both groups and are routed to lane 0.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info};
use types::ids::MarketId;
use types::market::Market;

use crate::config::CycleConfig;

/// Malformed market input (fatal to the cycle)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("duplicate market symbol {0}")]
    DuplicateSymbol(MarketId),

    #[error("market {symbol} does not match its currencies {src}/{dst}")]
    SymbolMismatch { symbol: MarketId, src: String, dst: String },

    #[error("market {0} trades a currency against itself")]
    SameCurrency(MarketId),

    #[error("market {0} has an empty currency code")]
    EmptyCurrency(MarketId),
}

/// Lane of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    Serial,
    A,
    B,
    C,
    D,
}

impl Lane {
    pub const ALL: [Lane; 5] = [Lane::Serial, Lane::A, Lane::B, Lane::C, Lane::D];

    /// Lane groups in execution order; lanes inside a group run concurrently
    pub const SCHEDULE: [&'static [Lane]; 3] = [&[Lane::Serial], &[Lane::A, Lane::B], &[Lane::C, Lane::D]];

    pub fn index(&self) -> usize {
        match self {
            Lane::Serial => 0,
            Lane::A => 1,
            Lane::B => 2,
            Lane::C => 3,
            Lane::D => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Lane::Serial => "serial",
            Lane::A => "A",
            Lane::B => "B",
            Lane::C => "C",
            Lane::D => "D",
        }
    }
}

/// Output of [`MarketPartitioner::partition`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    lanes: [Vec<Market>; 5],
}

impl Partition {
    pub fn lane(&self, lane: Lane) -> &[Market] {
        &self.lanes[lane.index()]
    }

    pub fn serial(&self) -> &[Market] {
        self.lane(Lane::Serial)
    }

    /// Total number of markets across lanes
    pub fn len(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every market with its lane
    pub fn iter(&self) -> impl Iterator<Item = (Lane, &Market)> {
        Lane::ALL
            .into_iter()
            .flat_map(move |lane| self.lane(lane).iter().map(move |m| (lane, m)))
    }

    /// Currencies touched by the markets of a lane
    pub fn currencies(&self, lane: Lane) -> BTreeSet<&str> {
        self.lane(lane)
            .iter()
            .flat_map(|m| [m.src_currency.as_str(), m.dst_currency.as_str()])
            .collect()
    }

    fn push(&mut self, lane: Lane, market: Market) {
        self.lanes[lane.index()].push(market);
    }

    fn sort(&mut self) {
        for lane in &mut self.lanes {
            lane.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        }
    }
}

/// Splits markets into concurrency lanes
#[derive(Debug, Clone, Default)]
pub struct MarketPartitioner {
    serial_only: bool,
    serial_markets: BTreeSet<MarketId>,
}

impl MarketPartitioner {
    pub fn new(serial_only: bool, serial_markets: BTreeSet<MarketId>) -> Self {
        Self {
            serial_only,
            serial_markets,
        }
    }

    pub fn from_config(config: &CycleConfig) -> Self {
        Self::new(config.serial_only, config.serial_markets.clone())
    }

    /// Partition `markets`; every input market lands in exactly one lane
    pub fn partition(&self, markets: &[Market]) -> Result<Partition, PartitionError> {
        validate(markets)?;

        let mut partition = Partition::default();
        if self.serial_only {
            for market in markets {
                partition.push(Lane::Serial, market.clone());
            }
            partition.sort();
            info!(markets = partition.len(), "Serial-only matching, all markets in lane 0");
            return Ok(partition);
        }

        let (serial, rest): (Vec<&Market>, Vec<&Market>) =
            markets.iter().partition(|m| self.serial_markets.contains(&m.symbol));

        // Bridge markets share a currency with both the big and the little groups
        let destinations: HashSet<&str> = rest.iter().map(|m| m.dst_currency.as_str()).collect();
        let (bridges, rest): (Vec<&Market>, Vec<&Market>) =
            rest.into_iter().partition(|m| destinations.contains(m.src_currency.as_str()));

        for market in serial.into_iter().chain(bridges.iter().copied()) {
            partition.push(Lane::Serial, market.clone());
        }
        if !bridges.is_empty() {
            debug!(
                bridges = ?bridges.iter().map(|m| m.symbol.as_str()).collect::<Vec<_>>(),
                "Bridge markets routed to lane 0"
            );
        }

        let mut by_destination: BTreeMap<&str, Vec<&Market>> = BTreeMap::new();
        for market in rest {
            by_destination.entry(market.dst_currency.as_str()).or_default().push(market);
        }

        // Most markets wins; BTreeMap order makes the smallest code win ties
        let big = by_destination
            .iter()
            .fold(None::<(&str, usize)>, |best, (dst, group)| match best {
                Some((_, count)) if count >= group.len() => best,
                _ => Some((*dst, group.len())),
            })
            .map(|(dst, _)| dst);

        let Some(big) = big else {
            partition.sort();
            return Ok(partition);
        };

        let mut big_markets = by_destination.remove(big).unwrap_or_default();
        big_markets.sort_by(|a, b| a.src_currency.cmp(&b.src_currency));
        let half = big_markets.len().div_ceil(2);
        let first_half: HashSet<&str> = big_markets[..half].iter().map(|m| m.src_currency.as_str()).collect();

        for (i, market) in big_markets.into_iter().enumerate() {
            let lane = if i < half { Lane::A } else { Lane::C };
            partition.push(lane, market.clone());
        }
        for market in by_destination.into_values().flatten() {
            let lane = if first_half.contains(market.src_currency.as_str()) {
                Lane::D
            } else {
                Lane::B
            };
            partition.push(lane, market.clone());
        }

        partition.sort();
        info!(
            big = big,
            serial = partition.lane(Lane::Serial).len(),
            a = partition.lane(Lane::A).len(),
            b = partition.lane(Lane::B).len(),
            c = partition.lane(Lane::C).len(),
            d = partition.lane(Lane::D).len(),
            "Markets partitioned"
        );
        Ok(partition)
    }
}

fn validate(markets: &[Market]) -> Result<(), PartitionError> {
    let mut seen = HashSet::with_capacity(markets.len());
    for market in markets {
        if !seen.insert(&market.symbol) {
            return Err(PartitionError::DuplicateSymbol(market.symbol.clone()));
        }
        if market.src_currency.is_empty() || market.dst_currency.is_empty() {
            return Err(PartitionError::EmptyCurrency(market.symbol.clone()));
        }
        if market.src_currency == market.dst_currency {
            return Err(PartitionError::SameCurrency(market.symbol.clone()));
        }
        if !market.symbol_matches_pair() {
            return Err(PartitionError::SymbolMismatch {
                symbol: market.symbol.clone(),
                src: market.src_currency.clone(),
                dst: market.dst_currency.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markets(symbols: &[&str]) -> Vec<Market> {
        symbols
            .iter()
            .map(|s| {
                let (src, dst) = s.split_once('/').unwrap();
                Market::new(src, dst)
            })
            .collect()
    }

    fn symbols(partition: &Partition, lane: Lane) -> Vec<&str> {
        partition.lane(lane).iter().map(|m| m.symbol.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        let partition = MarketPartitioner::default().partition(&[]).unwrap();
        assert!(partition.is_empty());
        for lane in Lane::ALL {
            assert!(partition.lane(lane).is_empty());
        }
    }

    #[test]
    fn test_big_little_split() {
        let input = markets(&[
            "BTC/IRT", "ETH/IRT", "LTC/IRT", "XRP/IRT", "DOGE/IRT",
            "BTC/USDT", "ETH/USDT", "XRP/USDT", "SHIB/USDT",
        ]);
        let partition = MarketPartitioner::default().partition(&input).unwrap();

        // big = IRT (5 markets), A = first 3 sources by code
        assert_eq!(symbols(&partition, Lane::A), vec!["BTC/IRT", "DOGE/IRT", "ETH/IRT"]);
        assert_eq!(symbols(&partition, Lane::C), vec!["LTC/IRT", "XRP/IRT"]);
        assert_eq!(symbols(&partition, Lane::D), vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(symbols(&partition, Lane::B), vec!["SHIB/USDT", "XRP/USDT"]);
        assert!(partition.serial().is_empty());
        assert_eq!(partition.len(), input.len());
    }

    #[test]
    fn test_bridge_market_goes_serial() {
        let input = markets(&["BTC/IRT", "ETH/IRT", "BTC/USDT", "USDT/IRT"]);
        let partition = MarketPartitioner::default().partition(&input).unwrap();

        assert_eq!(symbols(&partition, Lane::Serial), vec!["USDT/IRT"]);
        assert!(partition.currencies(Lane::A).is_disjoint(&partition.currencies(Lane::B)));
        assert!(partition.currencies(Lane::C).is_disjoint(&partition.currencies(Lane::D)));
    }

    #[test]
    fn test_serial_allow_list() {
        let input = markets(&["BTC/IRT", "ETH/IRT"]);
        let serial = [MarketId::new("ETH/IRT")].into_iter().collect();
        let partition = MarketPartitioner::new(false, serial).partition(&input).unwrap();

        assert_eq!(symbols(&partition, Lane::Serial), vec!["ETH/IRT"]);
        assert_eq!(symbols(&partition, Lane::A), vec!["BTC/IRT"]);
    }

    #[test]
    fn test_kill_switch_collapses_to_serial() {
        let input = markets(&["BTC/IRT", "ETH/IRT", "BTC/USDT"]);
        let partition = MarketPartitioner::new(true, BTreeSet::new()).partition(&input).unwrap();
        assert_eq!(partition.serial().len(), 3);
        assert_eq!(partition.len(), 3);
    }

    #[test]
    fn test_single_destination() {
        let input = markets(&["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
        let partition = MarketPartitioner::default().partition(&input).unwrap();
        assert_eq!(symbols(&partition, Lane::A), vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(symbols(&partition, Lane::C), vec!["SOL/USDT"]);
        assert!(partition.lane(Lane::B).is_empty());
        assert!(partition.lane(Lane::D).is_empty());
    }

    #[test]
    fn test_tie_broken_by_currency_code() {
        let input = markets(&["BTC/USDT", "ETH/USDT", "BTC/IRT", "ETH/IRT"]);
        let partition = MarketPartitioner::default().partition(&input).unwrap();
        // IRT < USDT, so IRT is big
        assert_eq!(symbols(&partition, Lane::A), vec!["BTC/IRT"]);
        assert_eq!(symbols(&partition, Lane::C), vec!["ETH/IRT"]);
        assert_eq!(symbols(&partition, Lane::D), vec!["BTC/USDT"]);
        assert_eq!(symbols(&partition, Lane::B), vec!["ETH/USDT"]);
    }

    #[test]
    fn test_invalid_input_rejected() {
        let partitioner = MarketPartitioner::default();

        let duplicate = markets(&["BTC/IRT", "BTC/IRT"]);
        assert_eq!(
            partitioner.partition(&duplicate),
            Err(PartitionError::DuplicateSymbol(MarketId::new("BTC/IRT")))
        );

        let same = markets(&["IRT/IRT"]);
        assert!(matches!(partitioner.partition(&same), Err(PartitionError::SameCurrency(_))));

        let empty = markets(&["/IRT"]);
        assert!(matches!(partitioner.partition(&empty), Err(PartitionError::EmptyCurrency(_))));

        let mut mismatched = Market::new("BTC", "IRT");
        mismatched.symbol = MarketId::new("ETH/IRT");
        assert!(matches!(
            partitioner.partition(&[mismatched]),
            Err(PartitionError::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn test_lane_schedule_covers_all_lanes() {
        let scheduled: Vec<Lane> = Lane::SCHEDULE.iter().flat_map(|g| g.iter().copied()).collect();
        assert_eq!(scheduled, Lane::ALL.to_vec());
    }
}
