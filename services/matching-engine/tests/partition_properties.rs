//! Partition properties over random market lists
//!
//! - Every input market lands in exactly one lane
//! - Lanes that run together share no currency
//! - The serial allow-list and the kill-switch are honored

use matching_engine::{Lane, MarketPartitioner};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use types::ids::MarketId;
use types::market::Market;

const CURRENCIES: [&str; 8] = ["BTC", "ETH", "SOL", "XRP", "DOGE", "USDT", "IRT", "EUR"];

fn market_list() -> impl Strategy<Value = Vec<Market>> {
    prop::collection::btree_set((0..CURRENCIES.len(), 0..CURRENCIES.len()), 0..30).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter(|(src, dst)| src != dst)
            .map(|(src, dst)| Market::new(CURRENCIES[src], CURRENCIES[dst]))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_partition_is_complete_and_disjoint(markets in market_list()) {
        let partition = MarketPartitioner::new(false, BTreeSet::new()).partition(&markets).unwrap();

        let mut seen = HashSet::new();
        for (_, market) in partition.iter() {
            prop_assert!(seen.insert(market.symbol.clone()), "{} placed twice", market.symbol);
        }
        let input: HashSet<MarketId> = markets.iter().map(|m| m.symbol.clone()).collect();
        prop_assert_eq!(seen, input);
    }

    #[test]
    fn prop_concurrent_lanes_share_no_currency(markets in market_list()) {
        let partition = MarketPartitioner::new(false, BTreeSet::new()).partition(&markets).unwrap();

        for (left, right) in [(Lane::A, Lane::B), (Lane::C, Lane::D)] {
            let shared: Vec<_> = partition
                .currencies(left)
                .intersection(&partition.currencies(right))
                .map(|c| c.to_string())
                .collect();
            prop_assert!(shared.is_empty(), "{:?}/{:?} share {:?}", left, right, shared);
        }
    }

    #[test]
    fn prop_allow_list_is_serial(markets in market_list(), pick in 0usize..30) {
        prop_assume!(!markets.is_empty());
        let chosen = markets[pick % markets.len()].symbol.clone();
        let partitioner = MarketPartitioner::new(false, BTreeSet::from([chosen.clone()]));
        let partition = partitioner.partition(&markets).unwrap();

        prop_assert!(partition.serial().iter().any(|m| m.symbol == chosen));
    }

    #[test]
    fn prop_kill_switch_serializes_everything(markets in market_list()) {
        let partition = MarketPartitioner::new(true, BTreeSet::new()).partition(&markets).unwrap();

        prop_assert_eq!(partition.serial().len(), markets.len());
        for lane in [Lane::A, Lane::B, Lane::C, Lane::D] {
            prop_assert!(partition.lane(lane).is_empty());
        }
    }
}
