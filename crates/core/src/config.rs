use crate::types::{
    FixedPriceWatcherOpts, PriceWatcherOpts, TradeDriverOpts, VolumeWatcherOpts,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Desired watcher set, applied per pair and reconciled on reload.
    #[serde(default)]
    pub watchers: Vec<WatcherProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reference pair feeding the BTC trend registry.
    #[serde(default = "default_btc_pair")]
    pub btc_pair: String,
    /// Ceiling on simultaneously open trades.
    #[serde(default = "default_max_concurrent_trades")]
    pub max_concurrent_trades: usize,
    /// Cooldown applied to a (pair, conf-line) after it triggers.
    #[serde(default = "default_inhibit_window_min")]
    pub inhibit_window_min: u32,
    /// Interval between liveness/PnL summary log lines.
    #[serde(default = "default_alive_ttl_min")]
    pub alive_ttl_min: u32,
    /// Directory receiving trade summary and failure artifacts.
    #[serde(default = "default_recorder_path")]
    pub recorder_path: String,
    /// Live trading against the exchange collaborator; false keeps every
    /// order on the simulated path.
    #[serde(default)]
    pub production: bool,
    /// Fill latency of the simulated execution backend.
    #[serde(default = "default_simulation_latency_ms")]
    pub simulation_latency_ms: u64,
    /// Size trades from historical per-configuration performance instead
    /// of the flat per-watcher amount.
    #[serde(default)]
    pub adaptive_investment: bool,
}

fn default_btc_pair() -> String {
    "BTCUSDT".to_string()
}
const fn default_max_concurrent_trades() -> usize {
    usize::MAX
}
const fn default_inhibit_window_min() -> u32 {
    60
}
const fn default_alive_ttl_min() -> u32 {
    30
}
fn default_recorder_path() -> String {
    "/tmp".to_string()
}
const fn default_simulation_latency_ms() -> u64 {
    3000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            btc_pair: default_btc_pair(),
            max_concurrent_trades: default_max_concurrent_trades(),
            inhibit_window_min: default_inhibit_window_min(),
            alive_ttl_min: default_alive_ttl_min(),
            recorder_path: default_recorder_path(),
            production: false,
            simulation_latency_ms: default_simulation_latency_ms(),
            adaptive_investment: false,
        }
    }
}

/// One watcher definition from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatcherProfile {
    Price {
        #[serde(default)]
        opts: PriceWatcherOpts,
        #[serde(default)]
        trade: TradeDriverOpts,
    },
    Volume {
        #[serde(default)]
        opts: VolumeWatcherOpts,
        #[serde(default)]
        trade: TradeDriverOpts,
    },
    FixedPrice {
        #[serde(default)]
        opts: FixedPriceWatcherOpts,
        #[serde(default)]
        trade: TradeDriverOpts,
    },
}
