use crate::history::MinuteHistory;
use flash_wick_core::{ConfData, FixedPriceWatcherOpts, Kline, TradeDriverOpts, WatcherKind};

/// Fires once when the price touches a target set at runtime.
///
/// The target is armed with [`set_target`](Self::set_target) and the
/// watcher latches after firing so one target yields at most one trade.
#[derive(Debug)]
pub struct FixedPriceWatcher {
    pair: String,
    trade: TradeDriverOpts,
    history: MinuteHistory,
    target: Option<f64>,
    order_sent: bool,
}

impl FixedPriceWatcher {
    const HISTORY_SIZE: usize = 5;

    #[must_use]
    pub fn new(pair: impl Into<String>, trade: TradeDriverOpts) -> Self {
        Self {
            pair: pair.into(),
            trade,
            history: MinuteHistory::new(Self::HISTORY_SIZE),
            target: None,
            order_sent: false,
        }
    }

    #[must_use]
    pub fn from_opts(
        pair: impl Into<String>,
        _opts: &FixedPriceWatcherOpts,
        trade: TradeDriverOpts,
    ) -> Self {
        Self::new(pair, trade)
    }

    pub fn on_kline(&mut self, msg: &Kline) {
        self.history.on_kline(msg);
    }

    /// Arms the watcher for a new target, clearing any previous latch.
    pub fn set_target(&mut self, price: f64) {
        tracing::info!(pair = %self.pair, price, "fixed-price target set");
        self.target = Some(price);
        self.order_sent = false;
    }

    pub fn clear_target(&mut self) {
        self.target = None;
        self.order_sent = false;
    }

    /// Evaluated on every tick against the forming candle. Latches on the
    /// first touch at or below the target.
    #[must_use]
    pub fn detect_flash_wick(&mut self) -> bool {
        if self.order_sent {
            return false;
        }
        let (Some(target), Some(stale)) = (self.target, self.history.stale()) else {
            return false;
        };
        if stale.close <= target {
            tracing::info!(pair = %self.pair, target, close = stale.close, "fixed price reached");
            self.order_sent = true;
            return true;
        }
        false
    }

    #[must_use]
    pub fn conf_data(&self) -> ConfData {
        ConfData {
            kind: WatcherKind::FixedPrice,
            pair: self.pair.clone(),
            config: self.trade.config_fragment(),
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
