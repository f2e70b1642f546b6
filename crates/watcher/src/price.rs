use crate::history::MinuteHistory;
use crate::watcher::DetectionGates;
use flash_wick_core::{ConfData, Kline, PriceWatcherOpts, TradeDriverOpts, WatcherKind};
use std::collections::VecDeque;

/// Minutes between samples of the coarse confirmation buffer.
const COARSE_SAMPLE_MINUTES: u64 = 5;

/// True when the coarse confirmation buffer needs more closed minutes to
/// fill than the minute ring does, so a fresh watcher cannot report a
/// down-wick until long after its ring is ready.
fn confirmation_outlives_ring(opts: &PriceWatcherOpts) -> bool {
    u64::from(opts.wick_down_lookback_min) > opts.history_size as u64
}

/// Detects flash wicks: a close that spikes away from any of the last N
/// minute opens by more than `flash_wick_ratio`.
///
/// A ratio above 1 hunts upward spikes. A ratio below 1 hunts downward
/// wicks, which additionally require the price to sit below where it was
/// `wick_down_lookback_min` minutes ago so a steady decline does not pass
/// for a wick.
#[derive(Debug)]
pub struct PriceWatcher {
    pair: String,
    opts: PriceWatcherOpts,
    trade: TradeDriverOpts,
    history: MinuteHistory,
    /// Closes sampled every `COARSE_SAMPLE_MINUTES` closed minutes,
    /// newest first. Only maintained in wick-down mode.
    coarse: VecDeque<f64>,
    coarse_capacity: usize,
    closed_minutes: u64,
}

impl PriceWatcher {
    #[must_use]
    pub fn new(pair: impl Into<String>, opts: PriceWatcherOpts, trade: TradeDriverOpts) -> Self {
        let pair = pair.into();
        let coarse_capacity =
            (u64::from(opts.wick_down_lookback_min) / COARSE_SAMPLE_MINUTES).max(1) as usize;
        if opts.flash_wick_ratio < 1.0 {
            if u64::from(opts.wick_down_lookback_min) < COARSE_SAMPLE_MINUTES {
                tracing::warn!(
                    %pair,
                    lookback_min = opts.wick_down_lookback_min,
                    "wick-down lookback shorter than one sample interval, \
                     confirmation degenerates to the latest close"
                );
            } else if confirmation_outlives_ring(&opts) {
                tracing::warn!(
                    %pair,
                    lookback_min = opts.wick_down_lookback_min,
                    history_size = opts.history_size,
                    "confirmation buffer fills after the minute ring, \
                     wick-down detection stays gated until the lookback elapses"
                );
            }
        }
        Self {
            history: MinuteHistory::new(opts.history_size),
            coarse: VecDeque::with_capacity(coarse_capacity),
            coarse_capacity,
            closed_minutes: 0,
            pair,
            opts,
            trade,
        }
    }

    pub fn on_kline(&mut self, msg: &Kline) {
        self.history.on_kline(msg);
        if self.history.minutes_updated() {
            self.closed_minutes += 1;
            if self.opts.flash_wick_ratio < 1.0
                && self.closed_minutes % COARSE_SAMPLE_MINUTES == 0
            {
                if let Some(closed) = self.history.closed().front() {
                    self.coarse.push_front(closed.close);
                    while self.coarse.len() > self.coarse_capacity {
                        self.coarse.pop_back();
                    }
                }
            }
        }
    }

    /// Runs one detection cycle against the buffered candles.
    ///
    /// Abstains (returns false) when the buffer is short or broken, when a
    /// gate rejects the pair, or, outside realtime mode, on any tick that
    /// did not close a minute.
    #[must_use]
    pub fn detect_flash_wick(&self, gates: &DetectionGates<'_>) -> bool {
        let current = if self.opts.realtime_detection {
            match self.history.stale() {
                Some(k) => k,
                None => return false,
            }
        } else {
            if !self.history.minutes_updated() {
                return false;
            }
            match self.history.closed().front() {
                Some(k) => k,
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

        let up = self.opts.flash_wick_ratio > 1.0;
        if !up {
            // long-horizon confirmation: refuse a wick verdict while the
            // coarse buffer is filling or the price is not actually down
            match self.coarse.back() {
                Some(&reference)
                    if self.coarse.len() == self.coarse_capacity
                        && current.close < reference => {}
                _ => return false,
            }
        }

        for kline in self.history.closed() {
            if kline.open <= 0.0 {
                continue;
            }
            let ratio = current.close / kline.open;
            let hit = if up {
                ratio > self.opts.flash_wick_ratio
            } else {
                ratio < self.opts.flash_wick_ratio
            };
            if hit {
                tracing::info!(
                    pair = %self.pair,
                    ratio,
                    threshold = self.opts.flash_wick_ratio,
                    "flash wick detected"
                );
                return true;
            }
        }
        false
    }

    #[must_use]
    pub fn conf_data(&self) -> ConfData {
        ConfData {
            kind: WatcherKind::Price,
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
    pub const fn opts(&self) -> &PriceWatcherOpts {
        &self.opts
    }

    /// Copy of the buffered closed candles, most recent first.
    #[must_use]
    pub fn get_history(&self) -> Vec<Kline> {
        self.history.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btc_trend::TrendRegistry;
    use crate::watcher::NoFamilies;
    use flash_wick_core::{FollowBtcTrend, MINUTE_MS};

    fn kline(start: i64, open: f64, close: f64) -> Kline {
        Kline {
            interval: "1m".to_string(),
            start,
            end: start + MINUTE_MS,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1.0,
        }
    }

    fn gates(trend: &TrendRegistry) -> DetectionGates<'_> {
        DetectionGates {
            trend,
            families: &NoFamilies,
        }
    }

    fn up_watcher(history_size: usize) -> PriceWatcher {
        PriceWatcher::new(
            "ETHUSDT",
            PriceWatcherOpts {
                flash_wick_ratio: 1.1,
                history_size,
                ..PriceWatcherOpts::default()
            },
            TradeDriverOpts::default(),
        )
    }

    #[test]
    fn spike_above_ratio_triggers_on_minute_close() {
        let trend = TrendRegistry::new();
        let mut watcher = up_watcher(3);
        for i in 0..4 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        // minute 3 closes at 111, above 1.1x every buffered open
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 111.0));
        watcher.on_kline(&kline(4 * MINUTE_MS, 111.0, 111.0));
        assert!(watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn spike_at_or_below_ratio_does_not_trigger() {
        let trend = TrendRegistry::new();
        let mut watcher = up_watcher(3);
        for i in 0..4 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 110.0));
        watcher.on_kline(&kline(4 * MINUTE_MS, 110.0, 110.0));
        assert!(!watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn gap_in_history_never_triggers() {
        let trend = TrendRegistry::new();
        let mut watcher = up_watcher(3);
        watcher.on_kline(&kline(0, 100.0, 100.0));
        watcher.on_kline(&kline(MINUTE_MS, 100.0, 100.0));
        // minute 2 missing
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 100.0));
        watcher.on_kline(&kline(4 * MINUTE_MS, 100.0, 200.0));
        watcher.on_kline(&kline(5 * MINUTE_MS, 200.0, 200.0));
        assert!(!watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn non_realtime_abstains_between_minute_closes() {
        let trend = TrendRegistry::new();
        let mut watcher = up_watcher(3);
        for i in 0..4 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        // in-place spike on the forming minute must be ignored
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 150.0));
        assert!(!watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn realtime_mode_fires_on_the_forming_minute() {
        let trend = TrendRegistry::new();
        let mut watcher = PriceWatcher::new(
            "ETHUSDT",
            PriceWatcherOpts {
                flash_wick_ratio: 1.1,
                history_size: 3,
                realtime_detection: true,
                ..PriceWatcherOpts::default()
            },
            TradeDriverOpts::default(),
        );
        for i in 0..4 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 150.0));
        assert!(watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn wick_down_requires_coarse_confirmation() {
        let trend = TrendRegistry::new();
        let mut watcher = PriceWatcher::new(
            "ETHUSDT",
            PriceWatcherOpts {
                flash_wick_ratio: 0.9,
                history_size: 3,
                wick_down_lookback_min: 5,
                ..PriceWatcherOpts::default()
            },
            TradeDriverOpts::default(),
        );
        // a deep drop before the coarse buffer has a sample is ignored
        for i in 0..3 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 80.0));
        watcher.on_kline(&kline(4 * MINUTE_MS, 80.0, 80.0));
        assert!(!watcher.detect_flash_wick(&gates(&trend)));

        // after 5 closed minutes the reference exists; a drop below both
        // the ratio and the reference now triggers
        let mut watcher = PriceWatcher::new(
            "ETHUSDT",
            PriceWatcherOpts {
                flash_wick_ratio: 0.9,
                history_size: 3,
                wick_down_lookback_min: 5,
                ..PriceWatcherOpts::default()
            },
            TradeDriverOpts::default(),
        );
        for i in 0..6 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        watcher.on_kline(&kline(6 * MINUTE_MS, 100.0, 80.0));
        watcher.on_kline(&kline(7 * MINUTE_MS, 80.0, 80.0));
        assert!(watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn lagging_confirmation_buffer_is_flagged() {
        let slow = PriceWatcherOpts {
            flash_wick_ratio: 0.9,
            history_size: 3,
            wick_down_lookback_min: 60,
            ..PriceWatcherOpts::default()
        };
        assert!(confirmation_outlives_ring(&slow));

        let matched = PriceWatcherOpts {
            flash_wick_ratio: 0.9,
            history_size: 60,
            wick_down_lookback_min: 60,
            ..PriceWatcherOpts::default()
        };
        assert!(!confirmation_outlives_ring(&matched));
    }

    #[test]
    fn btc_trend_gate_blocks_until_trend_is_up() {
        let mut trend = TrendRegistry::new();
        trend.ensure(2);
        let mut watcher = PriceWatcher::new(
            "ETHUSDT",
            PriceWatcherOpts {
                flash_wick_ratio: 1.1,
                history_size: 3,
                follow_btc_trend: FollowBtcTrend::Minutes(2),
                ..PriceWatcherOpts::default()
            },
            TradeDriverOpts::default(),
        );
        for i in 0..4 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        watcher.on_kline(&kline(3 * MINUTE_MS, 100.0, 150.0));
        watcher.on_kline(&kline(4 * MINUTE_MS, 150.0, 150.0));
        assert!(!watcher.detect_flash_wick(&gates(&trend)));

        trend.on_kline(&kline(0, 10.0, 10.0));
        trend.on_kline(&kline(MINUTE_MS, 10.0, 11.0));
        assert!(watcher.detect_flash_wick(&gates(&trend)));
    }

    #[test]
    fn history_snapshot_is_independent() {
        let mut watcher = up_watcher(2);
        for i in 0..3 {
            watcher.on_kline(&kline(i * MINUTE_MS, 100.0, 100.0));
        }
        let mut snap = watcher.get_history();
        snap[0].close = 1.0;
        assert!((watcher.get_history()[0].close - 100.0).abs() < f64::EPSILON);
    }
}
