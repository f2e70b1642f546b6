use serde::{Deserialize, Serialize};

/// Length of one candle interval in milliseconds.
pub const MINUTE_MS: i64 = 60_000;

/// One OHLCV candle as delivered by the feed.
///
/// `start` is inclusive, `end` exclusive: the candle for 12:00 covers
/// `[12:00:00.000, 12:01:00.000)` and the next candle starts exactly at
/// `end`. Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub interval: String,
    pub start: i64,
    pub end: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Kline {
    #[must_use]
    pub fn is_minute(&self) -> bool {
        self.interval == "1m"
    }

    /// A candle that closed at or above its open.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.close >= self.open
    }

    /// True if `next` is the candle immediately following this one.
    #[must_use]
    pub fn precedes(&self, next: &Self) -> bool {
        next.start == self.start + MINUTE_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kline(start: i64) -> Kline {
        Kline {
            interval: "1m".to_string(),
            start,
            end: start + MINUTE_MS,
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 100.0,
        }
    }

    #[test]
    fn precedes_requires_exactly_one_minute_gap() {
        let a = kline(0);
        assert!(a.precedes(&kline(MINUTE_MS)));
        assert!(!a.precedes(&kline(2 * MINUTE_MS)));
        assert!(!a.precedes(&kline(0)));
    }

    #[test]
    fn positive_candle_includes_flat() {
        let mut k = kline(0);
        k.open = 10.0;
        k.close = 10.0;
        assert!(k.is_positive());
        k.close = 9.9;
        assert!(!k.is_positive());
    }

    #[test]
    fn kline_roundtrips_through_json() {
        let k = kline(60_000);
        let json = serde_json::to_string(&k).unwrap();
        let back: Kline = serde_json::from_str(&json).unwrap();
        assert_eq!(k, back);
    }
}
