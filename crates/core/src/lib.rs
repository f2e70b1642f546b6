pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod kline;
pub mod traits;
pub mod types;

pub use config::{AppConfig, EngineConfig, WatcherProfile};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use kline::{Kline, MINUTE_MS};
pub use traits::{
    BuyFill, ExchangeExecutor, ExecutorError, Feed, SellFill, Sizing, SymbolMeta,
    VolumeFamilyProvider, LOT_SIZE_CODE,
};
pub use types::{
    ConfData, FixedPriceWatcherOpts, FollowBtcTrend, PriceWatcherOpts, SellReason,
    TradeDriverOpts, TradeInfo, TradeResult, VolumeWatcherOpts, WatcherKind,
};
