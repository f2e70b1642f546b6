use flash_wick_core::{
    BuyFill, ConfData, Kline, SellFill, SellReason, TradeDriverOpts, TradeInfo, TradeResult,
};

/// Trade lifecycle phases. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    None,
    Buy,
    Bought,
    Sell,
    Sold,
}

/// The trade state machine.
///
/// Pure and synchronous: every transition is driven by an explicit call
/// carrying its own clock (kline end timestamps for ticks, fill timestamps
/// for orders). The async runner owns the I/O around it.
#[derive(Debug)]
pub struct TradeDriver {
    conf: ConfData,
    opts: TradeDriverOpts,
    state: DriverState,
    info: TradeInfo,
    highest: f64,
    trailing_armed: bool,
}

impl TradeDriver {
    /// `quote_amount` comes from the sizing collaborator and may differ
    /// from the configured per-watcher amount.
    #[must_use]
    pub fn new(conf: ConfData, opts: TradeDriverOpts, quote_amount: f64) -> Self {
        Self {
            conf,
            opts,
            state: DriverState::None,
            info: TradeInfo {
                id: uuid::Uuid::new_v4().to_string(),
                amount: 0.0,
                quote_amount,
                price: 0.0,
                buy_timestamp: 0,
                bought_timestamp: 0,
                sell_timestamp: 0,
                low: 0.0,
            },
            highest: 0.0,
            trailing_armed: false,
        }
    }

    /// Commits the driver to buying. Idempotent: returns false and does
    /// nothing when the driver already left the initial state.
    pub fn start(&mut self, now_ms: i64) -> bool {
        if self.state != DriverState::None {
            return false;
        }
        self.state = DriverState::Buy;
        self.info.buy_timestamp = now_ms;
        tracing::info!(pair = %self.conf.pair, id = %self.info.id, "trade driver started");
        true
    }

    /// Records the entry fill. `now_ms` is on the kline clock, like every
    /// tick timestamp, so hold durations stay deterministic under replay.
    /// In buy-only mode the trade is complete and the reason is returned so
    /// the runner can close it without a sell leg.
    pub fn on_buy_fill(&mut self, fill: &BuyFill, now_ms: i64) -> Option<SellReason> {
        if self.state != DriverState::Buy {
            tracing::warn!(
                pair = %self.conf.pair,
                id = %self.info.id,
                state = ?self.state,
                "buy fill ignored outside the buy phase"
            );
            return None;
        }
        self.state = DriverState::Bought;
        self.info.amount = fill.executed_qty;
        self.info.quote_amount = fill.executed_quote_amount;
        self.info.price = fill.price;
        self.info.bought_timestamp = now_ms;
        self.info.low = fill.price * self.opts.stop_loss_ratio;
        self.highest = fill.price;
        if self.opts.buy_only {
            self.state = DriverState::Sell;
            self.info.sell_timestamp = now_ms;
            return Some(SellReason::BuyOnly);
        }
        None
    }

    /// Per-tick exit evaluation. No-op in any state but BOUGHT.
    ///
    /// Order: hold timeout, stop-loss inside the grace window, hold while
    /// under water, dynamic stop-loss ratchet, trailing exit, trailing
    /// activation / direct take-profit.
    pub fn evaluate(&mut self, kline: &Kline) -> Option<SellReason> {
        if self.state != DriverState::Bought {
            return None;
        }
        let close = kline.close;
        let now = kline.end;
        let held_ms = now - self.info.bought_timestamp;
        if close > self.highest {
            self.highest = close;
        }

        if held_ms >= self.opts.sell_after_ms {
            return self.trigger_sell(SellReason::Timeout, now);
        }

        if held_ms < self.opts.stop_inhibit_delay_ms {
            if close < self.info.low {
                return self.trigger_sell(SellReason::StopLoss, now);
            }
            // inside the grace window the stop-loss is the only exit
            return None;
        }

        if close < self.info.price {
            return None;
        }

        let price_ratio = close / self.info.price;
        if self.opts.dynamic_stop_loss > 0.0 && price_ratio > self.opts.dynamic_stop_loss {
            let raised = self.info.price * self.opts.dynamic_stop_loss_ratio;
            if raised > self.info.low {
                tracing::debug!(
                    pair = %self.conf.pair,
                    id = %self.info.id,
                    low = raised,
                    "stop-loss floor ratcheted"
                );
                self.info.low = raised;
            }
        }

        if self.trailing_armed {
            let trailing = (close - self.info.price) / (self.highest / self.info.price);
            if trailing < self.opts.trailing_limit_ratio {
                return self.trigger_sell(SellReason::TrailingStop, now);
            }
            return None;
        }

        if price_ratio >= self.opts.price_ratio {
            if self.opts.sell_direct {
                return self.trigger_sell(SellReason::Direct, now);
            }
            tracing::info!(pair = %self.conf.pair, id = %self.info.id, close, "trailing armed");
            self.trailing_armed = true;
        }
        None
    }

    /// Forces the exit transition from outside the tick path (hold timer
    /// expiry, feed shutdown). No-op unless the position is held.
    pub fn trigger_sell(&mut self, reason: SellReason, now: i64) -> Option<SellReason> {
        if self.state != DriverState::Bought {
            return None;
        }
        self.state = DriverState::Sell;
        self.info.sell_timestamp = now;
        tracing::info!(
            pair = %self.conf.pair,
            id = %self.info.id,
            %reason,
            "sell triggered"
        );
        Some(reason)
    }

    /// Records the exit fill and finalizes the trade.
    pub fn on_sell_fill(
        &mut self,
        fill: &SellFill,
        reason: SellReason,
        sell_strategy: Option<String>,
    ) -> TradeResult {
        self.state = DriverState::Sold;
        TradeResult {
            info: self.info.clone(),
            pair: self.conf.pair.clone(),
            sold_timestamp: fill.done_timestamp,
            sold_amount: fill.amount,
            sold_price: fill.price,
            sell_reason: reason,
            sell_strategy,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub const fn info(&self) -> &TradeInfo {
        &self.info
    }

    #[must_use]
    pub const fn conf(&self) -> &ConfData {
        &self.conf
    }

    #[must_use]
    pub const fn opts(&self) -> &TradeDriverOpts {
        &self.opts
    }

    #[must_use]
    pub fn pair(&self) -> &str {
        &self.conf.pair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_wick_core::{WatcherKind, MINUTE_MS};

    fn conf() -> ConfData {
        ConfData {
            kind: WatcherKind::Price,
            pair: "ETHUSDT".to_string(),
            config: "test".to_string(),
        }
    }

    fn buy_fill(price: f64, done_timestamp: i64) -> BuyFill {
        BuyFill {
            executed_quote_amount: 100.0,
            price,
            executed_qty: 100.0 / price,
            executed_qty_raw: format!("{:.8}", 100.0 / price),
            done_timestamp,
        }
    }

    fn tick(end: i64, close: f64) -> Kline {
        Kline {
            interval: "1m".to_string(),
            start: end - MINUTE_MS,
            end,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn bought_driver(opts: TradeDriverOpts, entry: f64) -> TradeDriver {
        let mut driver = TradeDriver::new(conf(), opts, 100.0);
        assert!(driver.start(0));
        assert!(driver.on_buy_fill(&buy_fill(entry, 0), 0).is_none());
        driver
    }

    #[test]
    fn start_is_idempotent() {
        let mut driver = TradeDriver::new(conf(), TradeDriverOpts::default(), 100.0);
        assert!(driver.start(10));
        assert!(!driver.start(20));
        assert_eq!(driver.state(), DriverState::Buy);
        assert_eq!(driver.info().buy_timestamp, 10);
    }

    #[test]
    fn buy_fill_is_ignored_outside_the_buy_phase() {
        // never started: the fill must not fabricate a position
        let mut driver = TradeDriver::new(conf(), TradeDriverOpts::default(), 100.0);
        assert!(driver.on_buy_fill(&buy_fill(100.0, 0), 0).is_none());
        assert_eq!(driver.state(), DriverState::None);
        assert!((driver.info().amount - 0.0).abs() < f64::EPSILON);

        // already bought: a second fill must not reprice the position
        let mut driver = bought_driver(TradeDriverOpts::default(), 100.0);
        assert!(driver.on_buy_fill(&buy_fill(200.0, 5), 5).is_none());
        assert!((driver.info().price - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn forced_sell_sets_the_sell_timestamp() {
        let mut driver = bought_driver(TradeDriverOpts::default(), 100.0);
        assert_eq!(
            driver.trigger_sell(SellReason::FeedClosed, 7 * MINUTE_MS),
            Some(SellReason::FeedClosed)
        );
        assert_eq!(driver.state(), DriverState::Sell);
        assert_eq!(driver.info().sell_timestamp, 7 * MINUTE_MS);
        // already selling: a second trigger is a no-op
        assert!(driver.trigger_sell(SellReason::Timeout, 8 * MINUTE_MS).is_none());
        assert_eq!(driver.info().sell_timestamp, 7 * MINUTE_MS);
    }

    #[test]
    fn evaluate_is_a_noop_before_bought() {
        let mut driver = TradeDriver::new(conf(), TradeDriverOpts::default(), 100.0);
        assert!(driver.evaluate(&tick(MINUTE_MS, 1.0)).is_none());
        driver.start(0);
        assert!(driver.evaluate(&tick(MINUTE_MS, 1.0)).is_none());
    }

    #[test]
    fn stop_loss_fires_only_inside_grace_window() {
        let opts = TradeDriverOpts {
            stop_inhibit_delay_ms: 5 * MINUTE_MS,
            ..TradeDriverOpts::default()
        };
        let mut driver = bought_driver(opts.clone(), 100.0);
        // inside the window, below the 0.98 floor
        assert_eq!(
            driver.evaluate(&tick(2 * MINUTE_MS, 97.0)),
            Some(SellReason::StopLoss)
        );

        // identical price outside the window does not trip the stop-loss
        let mut driver = bought_driver(opts, 100.0);
        assert!(driver.evaluate(&tick(6 * MINUTE_MS, 97.0)).is_none());
        assert_eq!(driver.state(), DriverState::Bought);
    }

    #[test]
    fn zero_inhibit_delay_disables_stop_loss() {
        let mut driver = bought_driver(TradeDriverOpts::default(), 100.0);
        assert!(driver.evaluate(&tick(MINUTE_MS, 50.0)).is_none());
    }

    #[test]
    fn grace_window_suppresses_take_profit() {
        let opts = TradeDriverOpts {
            stop_inhibit_delay_ms: 5 * MINUTE_MS,
            sell_direct: true,
            ..TradeDriverOpts::default()
        };
        let mut driver = bought_driver(opts, 100.0);
        // above price_ratio but still inside the grace window
        assert!(driver.evaluate(&tick(MINUTE_MS, 110.0)).is_none());
        assert_eq!(
            driver.evaluate(&tick(6 * MINUTE_MS, 110.0)),
            Some(SellReason::Direct)
        );
    }

    #[test]
    fn timeout_beats_every_other_exit() {
        let opts = TradeDriverOpts {
            sell_after_ms: 10 * MINUTE_MS,
            sell_direct: true,
            ..TradeDriverOpts::default()
        };
        let mut driver = bought_driver(opts, 100.0);
        assert_eq!(
            driver.evaluate(&tick(10 * MINUTE_MS, 200.0)),
            Some(SellReason::Timeout)
        );
    }

    #[test]
    fn trailing_sells_at_exactly_the_threshold_crossing() {
        let mut driver = bought_driver(TradeDriverOpts::default(), 100.0);
        // rise to 125 arms trailing on the way through 1.05
        assert!(driver.evaluate(&tick(MINUTE_MS, 125.0)).is_none());
        // highest = 125, threshold close = 100 + 0.85 * (125/100) = 101.0625
        assert!(driver.evaluate(&tick(2 * MINUTE_MS, 101.0625)).is_none());
        assert_eq!(
            driver.evaluate(&tick(3 * MINUTE_MS, 101.06)),
            Some(SellReason::TrailingStop)
        );
    }

    #[test]
    fn sell_direct_skips_trailing() {
        let opts = TradeDriverOpts {
            sell_direct: true,
            ..TradeDriverOpts::default()
        };
        let mut driver = bought_driver(opts, 100.0);
        assert_eq!(
            driver.evaluate(&tick(MINUTE_MS, 105.0)),
            Some(SellReason::Direct)
        );
    }

    #[test]
    fn dynamic_stop_loss_ratchets_upward_only() {
        let opts = TradeDriverOpts {
            stop_inhibit_delay_ms: MINUTE_MS,
            dynamic_stop_loss: 1.02,
            dynamic_stop_loss_ratio: 1.01,
            ..TradeDriverOpts::default()
        };
        let mut driver = bought_driver(opts, 100.0);
        assert!((driver.info().low - 98.0).abs() < 1e-9);
        // crossing the ratchet threshold lifts the floor to 101
        assert!(driver.evaluate(&tick(2 * MINUTE_MS, 103.0)).is_none());
        assert!((driver.info().low - 101.0).abs() < 1e-9);
        // falling back does not lower it
        assert!(driver.evaluate(&tick(3 * MINUTE_MS, 102.5)).is_none());
        assert!((driver.info().low - 101.0).abs() < 1e-9);
    }

    #[test]
    fn buy_only_completes_without_a_sell_leg() {
        let opts = TradeDriverOpts {
            buy_only: true,
            ..TradeDriverOpts::default()
        };
        let mut driver = TradeDriver::new(conf(), opts, 100.0);
        driver.start(0);
        let reason = driver.on_buy_fill(&buy_fill(50.0, 5), 5);
        assert_eq!(reason, Some(SellReason::BuyOnly));
        assert_eq!(driver.state(), DriverState::Sell);

        let result = driver.on_sell_fill(
            &SellFill {
                amount: 2.0,
                price: 50.0,
                done_timestamp: 5,
            },
            SellReason::BuyOnly,
            None,
        );
        assert_eq!(driver.state(), DriverState::Sold);
        assert!((result.pnl() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn result_carries_remediation_strategy() {
        let mut driver = bought_driver(
            TradeDriverOpts {
                sell_direct: true,
                ..TradeDriverOpts::default()
            },
            100.0,
        );
        driver.evaluate(&tick(MINUTE_MS, 105.0));
        let result = driver.on_sell_fill(
            &SellFill {
                amount: 1.0,
                price: 105.0,
                done_timestamp: 2 * MINUTE_MS,
            },
            SellReason::Direct,
            Some("exact-qty".to_string()),
        );
        assert_eq!(result.sell_reason, SellReason::Direct);
        assert_eq!(result.sell_strategy.as_deref(), Some("exact-qty"));
        assert_eq!(result.sold_timestamp, 2 * MINUTE_MS);
    }
}
