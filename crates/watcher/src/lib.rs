pub mod btc_trend;
pub mod collection;
pub mod fixed_price;
pub mod history;
pub mod price;
pub mod volume;
pub mod watcher;

pub use btc_trend::{BtcTrendRecorder, TrendRegistry};
pub use collection::{ReconcileReport, WatcherCollection};
pub use fixed_price::FixedPriceWatcher;
pub use history::MinuteHistory;
pub use price::PriceWatcher;
pub use volume::VolumeWatcher;
pub use watcher::{DetectionGates, MarketWatcher, NoFamilies};
