use crate::history::MinuteHistory;
use crate::watcher::DetectionGates;
use flash_wick_core::{ConfData, Kline, TradeDriverOpts, VolumeWatcherOpts, WatcherKind};

/// Detects volume spikes: a minute whose traded volume exceeds the maximum
/// of the buffered window by `volume_threshold_ratio`, on a rising candle.
#[derive(Debug)]
pub struct VolumeWatcher {
    pair: String,
    opts: VolumeWatcherOpts,
    trade: TradeDriverOpts,
    history: MinuteHistory,
}

impl VolumeWatcher {
    #[must_use]
    pub fn new(pair: impl Into<String>, opts: VolumeWatcherOpts, trade: TradeDriverOpts) -> Self {
        Self {
            pair: pair.into(),
            history: MinuteHistory::new(opts.history_size),
            opts,
            trade,
        }
    }

    pub fn on_kline(&mut self, msg: &Kline) {
        self.history.on_kline(msg);
    }

    /// Runs one detection cycle. The spike candidate is compared against
    /// every *other* buffered minute, so a freshly closed spike cannot be
    /// its own baseline.
    #[must_use]
    pub fn detect_flash_wick(&self, gates: &DetectionGates<'_>) -> bool {
        let ring = self.history.closed();
        let (current, baseline_skip) = if self.opts.realtime_detection {
            match self.history.stale() {
                Some(k) => (k, 0),
                None => return false,
            }
        } else {
            if !self.history.minutes_updated() {
                return false;
            }
            match ring.front() {
                Some(k) => (k, 1),
                None => return false,
            }
        };

        if !self.history.is_complete() {
            return false;
        }
        if !gates.trend_ok(self.opts.follow_btc_trend) {
            return false;
        }
        if !gates.family_ok(&self.pair, &self.opts.volume_families) {
            return false;
        }

        let max_volume = ring
            .iter()
            .skip(baseline_skip)
            .map(|k| k.volume)
            .fold(0.0_f64, f64::max);
        if max_volume <= 0.0 || ring.len() <= baseline_skip {
            return false;
        }

        if current.open <= 0.0 {
            return false;
        }
        let positive = current.close / current.open >= 1.0 + self.opts.min_positive_ratio;
        let spike = current.volume > max_volume * self.opts.volume_threshold_ratio;
        if spike && positive {
            tracing::info!(
                pair = %self.pair,
                volume = current.volume,
                max_volume,
                threshold = self.opts.volume_threshold_ratio,
                "volume spike detected"
            );
            return true;
        }
        false
    }

    #[must_use]
    pub fn conf_data(&self) -> ConfData {
        ConfData {
            kind: WatcherKind::Volume,
            pair: self.pair.clone(),
            config: format!(
                "{}-{}",
                self.opts.config_fragment(),
                self.trade.config_fragment()
            ),
        }
    }

    #[must_use]
    pub fn pair(&self) -> &str {
        &self.pair
    }

    #[must_use]
    pub const fn trade_opts(&self) -> &TradeDriverOpts {
        &self.trade
    }

    #[must_use]
    pub fn get_history(&self) -> Vec<Kline> {
        self.history.snapshot()
    }
}
