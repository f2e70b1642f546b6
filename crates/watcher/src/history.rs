use flash_wick_core::{Kline, MINUTE_MS};
use std::collections::VecDeque;

/// Stale-candle plus closed-minute ring shared by the price and volume
/// detectors.
///
/// The "stale" candle is the minute currently forming. A message whose
/// start is at or past the stale candle's end closes the stale candle into
/// the ring; earlier starts update the stale candle in place, which absorbs
/// out-of-order and duplicate ticks from the feed. Index 0 of the ring is
/// the most recently closed minute.
#[derive(Debug, Clone)]
pub struct MinuteHistory {
    history_size: usize,
    minutes: VecDeque<Kline>,
    stale: Option<Kline>,
    minutes_updated: bool,
}

impl MinuteHistory {
    #[must_use]
    pub fn new(history_size: usize) -> Self {
        Self {
            history_size,
            minutes: VecDeque::with_capacity(history_size + 1),
            stale: None,
            minutes_updated: false,
        }
    }

    pub fn on_kline(&mut self, msg: &Kline) {
        match &self.stale {
            Some(stale) if msg.start >= stale.end => {
                self.minutes.push_front(stale.clone());
                self.stale = Some(msg.clone());
                self.minutes_updated = true;
            }
            _ => {
                self.stale = Some(msg.clone());
                self.minutes_updated = false;
            }
        }

        while self.minutes.len() > self.history_size {
            self.minutes.pop_back();
        }
    }

    /// The minute currently forming, if any candle has been seen.
    #[must_use]
    pub fn stale(&self) -> Option<&Kline> {
        self.stale.as_ref()
    }

    /// True on the tick that closed a minute into the ring; reset by the
    /// next in-place update. Non-realtime detection keys off this.
    #[must_use]
    pub const fn minutes_updated(&self) -> bool {
        self.minutes_updated
    }

    #[must_use]
    pub fn closed(&self) -> &VecDeque<Kline> {
        &self.minutes
    }

    /// Defensive copy of the buffered closed candles, most recent first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Kline> {
        self.minutes.iter().cloned().collect()
    }

    /// Exactly `history_size` closed candles, each one minute after the
    /// next. A broken sequence invalidates detection for the cycle.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        if self.minutes.len() < self.history_size {
            return false;
        }
        for i in 0..self.minutes.len() - 1 {
            let current = &self.minutes[i];
            let previous = &self.minutes[i + 1];
            if current.start - previous.start != MINUTE_MS {
                tracing::debug!("minute buffer not contiguous, skipping detection");
                return false;
            }
        }
        true
    }
}
