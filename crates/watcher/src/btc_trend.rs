use flash_wick_core::Kline;
use std::collections::{HashMap, VecDeque};

/// Tracks whether BTC has risen over a fixed window of minute candles.
///
/// The trend is "ok" once the window is full and the newest close sits
/// above the oldest close.
#[derive(Debug)]
pub struct BtcTrendRecorder {
    history: VecDeque<Kline>,
    history_size: usize,
    trend_ok: bool,
}

impl BtcTrendRecorder {
    #[must_use]
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            history: VecDeque::new(),
            history_size: duration_minutes as usize,
            trend_ok: false,
        }
    }

    pub fn on_kline(&mut self, msg: &Kline) {
        match self.history.front() {
            Some(front) if front.start == msg.start => {
                self.history[0] = msg.clone();
            }
            _ => {
                self.history.push_front(msg.clone());
                if self.history.len() > self.history_size {
                    self.history.pop_back();
                }
            }
        }

        if self.history.len() == self.history_size {
            self.trend_ok = self.compute_trend();
        }
    }

    fn compute_trend(&self) -> bool {
        match (self.history.front(), self.history.back()) {
            (Some(last), Some(first)) => last.close > first.close,
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_trend_ok(&self) -> bool {
        self.trend_ok
    }
}

/// Trend recorders keyed by window duration, owned by the orchestrator and
/// passed by reference to the watchers that gate on it.
#[derive(Debug, Default)]
pub struct TrendRegistry {
    recorders: HashMap<u32, BtcTrendRecorder>,
}

impl TrendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a recorder for the duration if none exists yet.
    pub fn ensure(&mut self, duration_minutes: u32) {
        self.recorders
            .entry(duration_minutes)
            .or_insert_with(|| BtcTrendRecorder::new(duration_minutes));
    }

    /// Feeds a BTC reference-pair kline to every registered recorder.
    pub fn on_kline(&mut self, msg: &Kline) {
        for recorder in self.recorders.values_mut() {
            recorder.on_kline(msg);
        }
    }

    /// Trend state for the given window. Unregistered durations are
    /// conservatively not-ok.
    #[must_use]
    pub fn is_trend_ok(&self, duration_minutes: u32) -> bool {
        self.recorders
            .get(&duration_minutes)
            .is_some_and(BtcTrendRecorder::is_trend_ok)
    }
}
