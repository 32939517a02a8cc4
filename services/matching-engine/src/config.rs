//! Engine configuration
//!
//! [`EngineConfig`] is fixed for the lifetime of the engine. [`CycleConfig`]
//! is read from the [`SettingsStore`] once at the start of every cycle and
//! stays immutable while the cycle runs.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;
use types::fee::{default_fee_tiers, FeeTier};
use types::ids::{AccountId, MarketId};
use uuid::Uuid;

pub const KEY_MODULE_ENABLED: &str = "module_matching_engine";
pub const KEY_SERIAL_ONLY: &str = "matcher_serial_only";
pub const KEY_SERIAL_MARKETS: &str = "matcher_serial_markets";
pub const KEY_PREVENT_INTERNAL_TRADE: &str = "matcher_prevent_internal_trade";
pub const KEY_TRADER_BOT_IDS: &str = "matcher_trader_bot_ids";
pub const KEY_MAX_TRADES_PER_ROUND: &str = "matcher_max_trades_per_round";
pub const KEY_FEE_TIERS: &str = "matcher_fee_tiers";

/// Per-market trade cap when settings carry none
pub const DEFAULT_MAX_TRADES_PER_ROUND: usize = 200;

/// Configuration errors (fatal to the cycle)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// String-keyed runtime settings
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory settings
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

/// Static engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Account whose wallets collect trading fees
    pub fee_account: AccountId,
    /// Largest accepted gap between a market order's guard price and the
    /// matched price, as a fraction of the guard price
    pub market_order_max_price_diff: Decimal,
    /// Multiplier on the paying balance when validating market buys
    pub market_buy_range_allowance: Decimal,
    /// First trade sequence number
    pub starting_sequence: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_account: AccountId::from_uuid(Uuid::nil()),
            market_order_max_price_diff: Decimal::new(1, 2), // 1%
            market_buy_range_allowance: Decimal::new(11, 1), // 1.1
            starting_sequence: 1,
        }
    }
}

/// Settings snapshot for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub enabled: bool,
    pub serial_only: bool,
    pub serial_markets: BTreeSet<MarketId>,
    pub prevent_internal_trade: bool,
    pub trader_bot_ids: HashSet<AccountId>,
    pub max_trades_per_round: usize,
    pub fee_tiers: Vec<FeeTier>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            serial_only: false,
            serial_markets: BTreeSet::new(),
            prevent_internal_trade: true,
            trader_bot_ids: HashSet::new(),
            max_trades_per_round: DEFAULT_MAX_TRADES_PER_ROUND,
            fee_tiers: default_fee_tiers(),
        }
    }
}

impl CycleConfig {
    /// Read every setting once; missing keys take their defaults
    pub fn load(settings: &dyn SettingsStore) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let enabled = match settings.get(KEY_MODULE_ENABLED).as_deref().map(str::trim) {
            None | Some("enabled") => true,
            Some("disabled") => false,
            Some(other) => {
                return Err(invalid(KEY_MODULE_ENABLED, format!("expected enabled or disabled, got {other:?}")))
            }
        };

        let serial_markets: Vec<String> = parse_json(settings, KEY_SERIAL_MARKETS)?.unwrap_or_default();
        let serial_markets = serial_markets
            .into_iter()
            .map(|symbol| {
                MarketId::try_new(symbol.clone())
                    .ok_or_else(|| invalid(KEY_SERIAL_MARKETS, format!("bad market symbol {symbol:?}")))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let trader_bot_ids: Vec<Uuid> = parse_json(settings, KEY_TRADER_BOT_IDS)?.unwrap_or_default();

        let max_trades_per_round = parse_json::<usize>(settings, KEY_MAX_TRADES_PER_ROUND)?
            .unwrap_or(defaults.max_trades_per_round);
        if max_trades_per_round == 0 {
            return Err(invalid(KEY_MAX_TRADES_PER_ROUND, "must be at least 1".to_string()));
        }

        let fee_tiers: Vec<FeeTier> = parse_json(settings, KEY_FEE_TIERS)?.unwrap_or(defaults.fee_tiers);
        if fee_tiers.iter().any(|t| t.maker_rate < Decimal::ZERO || t.taker_rate < Decimal::ZERO) {
            return Err(invalid(KEY_FEE_TIERS, "fee rates must not be negative".to_string()));
        }

        Ok(Self {
            enabled,
            serial_only: parse_json(settings, KEY_SERIAL_ONLY)?.unwrap_or(defaults.serial_only),
            serial_markets,
            prevent_internal_trade: parse_json(settings, KEY_PREVENT_INTERNAL_TRADE)?
                .unwrap_or(defaults.prevent_internal_trade),
            trader_bot_ids: trader_bot_ids.into_iter().map(AccountId::from_uuid).collect(),
            max_trades_per_round,
            fee_tiers,
        })
    }
}

fn invalid(key: &str, reason: String) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason,
    }
}

fn parse_json<T: DeserializeOwned>(settings: &dyn SettingsStore, key: &str) -> Result<Option<T>, ConfigError> {
    match settings.get(key) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| invalid(key, e.to_string())),
    }
}
