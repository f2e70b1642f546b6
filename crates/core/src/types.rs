use serde::{Deserialize, Serialize};

/// Default BTC trend window when `follow_btc_trend = true` carries no duration.
pub const DEFAULT_TREND_MINUTES: u32 = 15;

/// Which detector variant a watcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherKind {
    Price,
    Volume,
    FixedPrice,
}

impl WatcherKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::FixedPrice => "fixed-price",
        }
    }
}

impl std::fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured watcher identity: kind + pair + the canonical option string.
///
/// The flattened form (`line()`) keys inhibition entries, PnL buckets and
/// reconciliation diffs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfData {
    pub kind: WatcherKind,
    pub pair: String,
    pub config: String,
}

impl ConfData {
    #[must_use]
    pub fn line(&self) -> String {
        format!("{}-{}-{}", self.kind, self.pair, self.config)
    }

    /// Identity independent of the pair, used to bucket results across pairs.
    #[must_use]
    pub fn profile_key(&self) -> String {
        format!("{} {}", self.kind, self.config)
    }
}

/// Whether a watcher gates on the BTC trend, and over which window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FollowBtcTrend {
    Flag(bool),
    Minutes(u32),
}

impl Default for FollowBtcTrend {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl FollowBtcTrend {
    /// Trend window in minutes, or `None` when the gate is off.
    #[must_use]
    pub const fn duration_minutes(self) -> Option<u32> {
        match self {
            Self::Flag(false) => None,
            Self::Flag(true) => Some(DEFAULT_TREND_MINUTES),
            Self::Minutes(m) => Some(m),
        }
    }

    fn fragment(self) -> String {
        match self.duration_minutes() {
            None => "false".to_string(),
            Some(m) => m.to_string(),
        }
    }
}

/// Risk and exit parameters handed to each spawned trade driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDriverOpts {
    /// Quote-currency amount committed per trade.
    #[serde(default = "default_quote_amount")]
    pub quote_amount: f64,
    /// Stop-loss floor as a ratio of the entry price.
    #[serde(default = "default_stop_loss_ratio")]
    pub stop_loss_ratio: f64,
    /// Grace window after purchase during which the stop-loss is the only
    /// active exit. 0 disables the stop-loss entirely.
    #[serde(default)]
    pub stop_inhibit_delay_ms: i64,
    /// Profit-trailing exit threshold once trailing is armed.
    #[serde(default = "default_trailing_limit_ratio")]
    pub trailing_limit_ratio: f64,
    /// Hard hold-duration timeout.
    #[serde(default = "default_sell_after_ms")]
    pub sell_after_ms: i64,
    /// Sell immediately at the profit target instead of arming trailing.
    #[serde(default)]
    pub sell_direct: bool,
    /// close/entry ratio that takes profit or arms trailing mode.
    #[serde(default = "default_price_ratio")]
    pub price_ratio: f64,
    /// close/entry ratio above which the stop-loss floor ratchets up.
    /// 0 disables dynamic stop-loss.
    #[serde(default)]
    pub dynamic_stop_loss: f64,
    /// New stop-loss floor (relative to entry) once the ratchet fires.
    #[serde(default)]
    pub dynamic_stop_loss_ratio: f64,
    /// Complete as sold at the entry price right after the buy fills.
    #[serde(default)]
    pub buy_only: bool,
}

fn default_quote_amount() -> f64 {
    100.0
}
fn default_stop_loss_ratio() -> f64 {
    0.98
}
fn default_trailing_limit_ratio() -> f64 {
    0.85
}
const fn default_sell_after_ms() -> i64 {
    1000 * 60 * 60
}
fn default_price_ratio() -> f64 {
    1.05
}

impl Default for TradeDriverOpts {
    fn default() -> Self {
        Self {
            quote_amount: default_quote_amount(),
            stop_loss_ratio: default_stop_loss_ratio(),
            stop_inhibit_delay_ms: 0,
            trailing_limit_ratio: default_trailing_limit_ratio(),
            sell_after_ms: default_sell_after_ms(),
            sell_direct: false,
            price_ratio: default_price_ratio(),
            dynamic_stop_loss: 0.0,
            dynamic_stop_loss_ratio: 0.0,
            buy_only: false,
        }
    }
}

impl TradeDriverOpts {
    /// Canonical fragment appended to a watcher's conf line.
    #[must_use]
    pub fn config_fragment(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.stop_loss_ratio,
            self.stop_inhibit_delay_ms,
            self.trailing_limit_ratio,
            self.sell_after_ms,
            self.sell_direct,
            self.price_ratio,
            self.dynamic_stop_loss,
            self.dynamic_stop_loss_ratio,
            self.buy_only,
        )
    }
}

/// Price flash-wick detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWatcherOpts {
    /// Trigger ratio. `> 1` detects upward spikes, `< 1` downward wicks.
    #[serde(default = "default_flash_wick_ratio")]
    pub flash_wick_ratio: f64,
    /// Number of closed minute candles kept for detection.
    #[serde(default = "default_price_history_size")]
    pub history_size: usize,
    /// Evaluate on every tick (stale candle) instead of once per closed minute.
    #[serde(default)]
    pub realtime_detection: bool,
    #[serde(default)]
    pub follow_btc_trend: FollowBtcTrend,
    /// Volume-family allow-list; empty means no filtering.
    #[serde(default)]
    pub volume_families: Vec<String>,
    /// Lookback of the coarse 5-minute confirmation buffer for wick-down
    /// detection.
    #[serde(default = "default_wick_down_lookback_min")]
    pub wick_down_lookback_min: u32,
}

fn default_flash_wick_ratio() -> f64 {
    1.1
}
const fn default_price_history_size() -> usize {
    5
}
const fn default_wick_down_lookback_min() -> u32 {
    60
}

impl Default for PriceWatcherOpts {
    fn default() -> Self {
        Self {
            flash_wick_ratio: default_flash_wick_ratio(),
            history_size: default_price_history_size(),
            realtime_detection: false,
            follow_btc_trend: FollowBtcTrend::default(),
            volume_families: Vec::new(),
            wick_down_lookback_min: default_wick_down_lookback_min(),
        }
    }
}

impl PriceWatcherOpts {
    #[must_use]
    pub fn config_fragment(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.flash_wick_ratio,
            self.history_size,
            self.realtime_detection,
            self.follow_btc_trend.fragment(),
        )
    }
}

/// Volume spike detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeWatcherOpts {
    /// Current-minute volume must exceed the buffered maximum times this.
    #[serde(default = "default_volume_threshold_ratio")]
    pub volume_threshold_ratio: f64,
    #[serde(default = "default_volume_history_size")]
    pub history_size: usize,
    /// Extra close/open margin above 1.0 required for a "positive" candle.
    #[serde(default)]
    pub min_positive_ratio: f64,
    #[serde(default)]
    pub realtime_detection: bool,
    #[serde(default)]
    pub follow_btc_trend: FollowBtcTrend,
    #[serde(default)]
    pub volume_families: Vec<String>,
}

fn default_volume_threshold_ratio() -> f64 {
    40.0
}
const fn default_volume_history_size() -> usize {
    45
}

impl Default for VolumeWatcherOpts {
    fn default() -> Self {
        Self {
            volume_threshold_ratio: default_volume_threshold_ratio(),
            history_size: default_volume_history_size(),
            min_positive_ratio: 0.0,
            realtime_detection: false,
            follow_btc_trend: FollowBtcTrend::default(),
            volume_families: Vec::new(),
        }
    }
}

impl VolumeWatcherOpts {
    #[must_use]
    pub fn config_fragment(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.volume_threshold_ratio,
            self.history_size,
            self.realtime_detection,
            self.follow_btc_trend.fragment(),
        )
    }
}

/// Fixed-price watcher configuration. The target itself is set at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedPriceWatcherOpts {
    /// Pairs this watcher is armed for.
    #[serde(default)]
    pub pairs: Vec<String>,
}

/// Why a trade driver decided to sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellReason {
    Timeout,
    StopLoss,
    TrailingStop,
    Direct,
    BuyOnly,
    /// The kline feed closed while the position was held.
    FeedClosed,
}

impl std::fmt::Display for SellReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::StopLoss => "stop-loss",
            Self::TrailingStop => "trailing-stop",
            Self::Direct => "direct",
            Self::BuyOnly => "buy-only",
            Self::FeedClosed => "feed-closed",
        };
        f.write_str(s)
    }
}

/// Snapshot of the entry leg, filled in as each phase resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInfo {
    pub id: String,
    /// Base-asset quantity bought.
    pub amount: f64,
    /// Quote-currency amount committed.
    pub quote_amount: f64,
    /// Average entry price.
    pub price: f64,
    /// When the buy order was submitted (ms epoch).
    pub buy_timestamp: i64,
    /// When the buy fill resolved.
    pub bought_timestamp: i64,
    /// When the sell was triggered (0 until then).
    pub sell_timestamp: i64,
    /// Stop-loss floor.
    pub low: f64,
}

/// Terminal outcome of a completed trade. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    #[serde(flatten)]
    pub info: TradeInfo,
    pub pair: String,
    pub sold_timestamp: i64,
    pub sold_amount: f64,
    pub sold_price: f64,
    pub sell_reason: SellReason,
    /// Remediation strategy used by the sell leg, when any.
    pub sell_strategy: Option<String>,
}

impl TradeResult {
    /// Realized profit in quote currency.
    #[must_use]
    pub fn pnl(&self) -> f64 {
        self.sold_amount * self.sold_price - self.info.quote_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_btc_trend_flag_maps_to_default_window() {
        assert_eq!(FollowBtcTrend::Flag(false).duration_minutes(), None);
        assert_eq!(
            FollowBtcTrend::Flag(true).duration_minutes(),
            Some(DEFAULT_TREND_MINUTES)
        );
        assert_eq!(FollowBtcTrend::Minutes(60).duration_minutes(), Some(60));
    }

    #[test]
    fn follow_btc_trend_deserializes_bool_or_int() {
        let flag: FollowBtcTrend = serde_json::from_str("true").unwrap();
        assert_eq!(flag, FollowBtcTrend::Flag(true));
        let minutes: FollowBtcTrend = serde_json::from_str("30").unwrap();
        assert_eq!(minutes, FollowBtcTrend::Minutes(30));
    }

    #[test]
    fn conf_line_is_stable_for_equal_opts() {
        let a = PriceWatcherOpts::default();
        let b = PriceWatcherOpts::default();
        assert_eq!(a.config_fragment(), b.config_fragment());

        let data = ConfData {
            kind: WatcherKind::Price,
            pair: "ETHUSDT".to_string(),
            config: a.config_fragment(),
        };
        assert_eq!(data.line(), format!("price-ETHUSDT-{}", b.config_fragment()));
    }

    #[test]
    fn trade_driver_opts_defaults_match_contract() {
        let opts = TradeDriverOpts::default();
        assert!((opts.stop_loss_ratio - 0.98).abs() < f64::EPSILON);
        assert!((opts.trailing_limit_ratio - 0.85).abs() < f64::EPSILON);
        assert!((opts.price_ratio - 1.05).abs() < f64::EPSILON);
        assert_eq!(opts.sell_after_ms, 3_600_000);
        assert_eq!(opts.stop_inhibit_delay_ms, 0);
        assert!(!opts.sell_direct);
        assert!(!opts.buy_only);
    }

    #[test]
    fn trade_result_pnl_is_sold_value_minus_committed() {
        let result = TradeResult {
            info: TradeInfo {
                id: "t1".to_string(),
                amount: 2.0,
                quote_amount: 100.0,
                price: 50.0,
                buy_timestamp: 0,
                bought_timestamp: 1,
                sell_timestamp: 2,
                low: 49.0,
            },
            pair: "ETHUSDT".to_string(),
            sold_timestamp: 3,
            sold_amount: 2.0,
            sold_price: 55.0,
            sell_reason: SellReason::Direct,
            sell_strategy: None,
        };
        assert!((result.pnl() - 10.0).abs() < 1e-9);
    }
}
