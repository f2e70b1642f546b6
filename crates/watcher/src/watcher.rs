use crate::btc_trend::TrendRegistry;
use crate::fixed_price::FixedPriceWatcher;
use crate::price::PriceWatcher;
use crate::volume::VolumeWatcher;
use flash_wick_core::{
    ConfData, FollowBtcTrend, Kline, TradeDriverOpts, VolumeFamilyProvider, WatcherKind,
};

/// Read-only collaborators consulted during a detection cycle.
pub struct DetectionGates<'a> {
    pub trend: &'a TrendRegistry,
    pub families: &'a dyn VolumeFamilyProvider,
}

impl DetectionGates<'_> {
    /// True when the watcher does not gate on the BTC trend, or the trend
    /// over the configured window is up.
    #[must_use]
    pub fn trend_ok(&self, follow: FollowBtcTrend) -> bool {
        match follow.duration_minutes() {
            None => true,
            Some(minutes) => self.trend.is_trend_ok(minutes),
        }
    }

    /// True when the allow-list is empty or the pair's volume family is on
    /// it. Pairs with no known family are rejected by a non-empty list.
    #[must_use]
    pub fn family_ok(&self, pair: &str, allow: &[String]) -> bool {
        if allow.is_empty() {
            return true;
        }
        self.families
            .volume_family(pair)
            .is_some_and(|family| allow.contains(&family))
    }
}

/// Family provider for deployments that do not classify pairs.
pub struct NoFamilies;

impl VolumeFamilyProvider for NoFamilies {
    fn volume_family(&self, _pair: &str) -> Option<String> {
        None
    }
}

/// Closed set of detector variants, dispatched without dynamic typing.
#[derive(Debug)]
pub enum MarketWatcher {
    Price(PriceWatcher),
    Volume(VolumeWatcher),
    FixedPrice(FixedPriceWatcher),
}

impl MarketWatcher {
    pub fn on_kline(&mut self, msg: &Kline) {
        match self {
            Self::Price(w) => w.on_kline(msg),
            Self::Volume(w) => w.on_kline(msg),
            Self::FixedPrice(w) => w.on_kline(msg),
        }
    }

    #[must_use]
    pub fn detect_flash_wick(&mut self, gates: &DetectionGates<'_>) -> bool {
        match self {
            Self::Price(w) => w.detect_flash_wick(gates),
            Self::Volume(w) => w.detect_flash_wick(gates),
            Self::FixedPrice(w) => w.detect_flash_wick(),
        }
    }

    #[must_use]
    pub fn conf_data(&self) -> ConfData {
        match self {
            Self::Price(w) => w.conf_data(),
            Self::Volume(w) => w.conf_data(),
            Self::FixedPrice(w) => w.conf_data(),
        }
    }

    /// Flattened identity used for inhibition and PnL bucketing.
    #[must_use]
    pub fn conf_line(&self) -> String {
        self.conf_data().line()
    }

    #[must_use]
    pub fn pair(&self) -> &str {
        match self {
            Self::Price(w) => w.pair(),
            Self::Volume(w) => w.pair(),
            Self::FixedPrice(w) => w.pair(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> WatcherKind {
        match self {
            Self::Price(_) => WatcherKind::Price,
            Self::Volume(_) => WatcherKind::Volume,
            Self::FixedPrice(_) => WatcherKind::FixedPrice,
        }
    }

    #[must_use]
    pub const fn trade_opts(&self) -> &TradeDriverOpts {
        match self {
            Self::Price(w) => w.trade_opts(),
            Self::Volume(w) => w.trade_opts(),
            Self::FixedPrice(w) => w.trade_opts(),
        }
    }

    #[must_use]
    pub fn get_history(&self) -> Vec<Kline> {
        match self {
            Self::Price(w) => w.get_history(),
            Self::Volume(w) => w.get_history(),
            Self::FixedPrice(w) => w.get_history(),
        }
    }

    /// Access for runtime target arming. `None` for the detector variants.
    pub fn as_fixed_price_mut(&mut self) -> Option<&mut FixedPriceWatcher> {
        match self {
            Self::FixedPrice(w) => Some(w),
            _ => None,
        }
    }
}
