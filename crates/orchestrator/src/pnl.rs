use flash_wick_core::{ConfData, TradeResult};
use std::collections::HashMap;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    pnl: f64,
    trades: usize,
    wins: usize,
}

/// Running profit per conf line, rotated daily.
///
/// Rotation is driven by trade timestamps, not the wall clock, so replayed
/// history rotates the same way live trading does.
#[derive(Debug, Default)]
pub struct PnlAggregator {
    day: i64,
    by_line: HashMap<String, Bucket>,
}

impl PnlAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, conf: &ConfData, result: &TradeResult) {
        let day = result.sold_timestamp / DAY_MS;
        if day != self.day {
            if !self.by_line.is_empty() {
                tracing::info!(summary = %self.summary(), "daily pnl rollover");
                self.by_line.clear();
            }
            self.day = day;
        }

        let pnl = result.pnl();
        let bucket = self.by_line.entry(conf.line()).or_default();
        bucket.pnl += pnl;
        bucket.trades += 1;
        if pnl > 0.0 {
            bucket.wins += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.by_line.values().map(|b| b.pnl).sum()
    }

    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.by_line.values().map(|b| b.trades).sum()
    }

    /// One line per conf line, sorted by identity for stable logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines: Vec<&String> = self.by_line.keys().collect();
        lines.sort();
        let mut out = String::new();
        for line in lines {
            let bucket = &self.by_line[line];
            out.push_str(&format!(
                "{line}: pnl={:.2} trades={} wins={}\n",
                bucket.pnl, bucket.trades, bucket.wins
            ));
        }
        out.push_str(&format!(
            "total: pnl={:.2} trades={}",
            self.total(),
            self.trade_count()
        ));
        out
    }
}
