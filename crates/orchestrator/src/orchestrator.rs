use crate::inhibitor::WatcherInhibitor;
use crate::pnl::PnlAggregator;
use crate::recorder::TradeRecorder;
use crate::sizing::AdaptiveSizing;
use anyhow::{anyhow, Result};
use flash_wick_core::{
    AppConfig, ConfData, EngineConfig, Feed, Kline, Sizing, SymbolMeta, TradeDriverOpts,
    VolumeFamilyProvider, MINUTE_MS,
};
use flash_wick_trader::{spawn_driver, DriverHandle, ExecutorWrapper, TradeDriver, TradeEnd};
use flash_wick_watcher::{DetectionGates, TrendRegistry, WatcherCollection};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Buffer for terminal trade messages.
const END_CHANNEL_CAPACITY: usize = 64;

/// Single-threaded event loop at the center of the engine.
///
/// Every kline flows through [`on_kline`](Self::on_kline): the BTC
/// reference pair feeds the trend registry, open trades get the tick fanned
/// out, detectors run, and detections are gated (prevention flag, capacity,
/// inhibition) before a trade driver is spawned. Trade ends come back on a
/// channel and are processed on the same loop, so no state needs locking.
pub struct Orchestrator {
    engine: EngineConfig,
    collection: WatcherCollection,
    trend: TrendRegistry,
    inhibitor: WatcherInhibitor,
    pnl: PnlAggregator,
    recorder: TradeRecorder,
    sizing: Option<Box<dyn Sizing>>,
    executor: Arc<ExecutorWrapper>,
    meta: Arc<dyn SymbolMeta>,
    families: Arc<dyn VolumeFamilyProvider>,
    drivers: Vec<DriverHandle>,
    end_tx: mpsc::Sender<TradeEnd>,
    end_rx: Option<mpsc::Receiver<TradeEnd>>,
    trade_prevented: watch::Receiver<bool>,
    /// Permanent capacity reductions from stranded positions. Survives
    /// config reloads.
    capacity_penalty: usize,
    last_alive_ms: i64,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        executor: ExecutorWrapper,
        meta: Arc<dyn SymbolMeta>,
        families: Arc<dyn VolumeFamilyProvider>,
        trade_prevented: watch::Receiver<bool>,
    ) -> Self {
        let collection = WatcherCollection::new(config.watchers);
        let mut trend = TrendRegistry::new();
        for duration in collection.trend_durations() {
            trend.ensure(duration);
        }
        let sizing: Option<Box<dyn Sizing>> = config
            .engine
            .adaptive_investment
            .then(|| Box::new(AdaptiveSizing::new(AdaptiveSizing::DEFAULT_BASE)) as Box<dyn Sizing>);
        let (end_tx, end_rx) = mpsc::channel(END_CHANNEL_CAPACITY);

        Self {
            inhibitor: WatcherInhibitor::new(config.engine.inhibit_window_min),
            recorder: TradeRecorder::new(&config.engine.recorder_path),
            engine: config.engine,
            collection,
            trend,
            pnl: PnlAggregator::new(),
            sizing,
            executor: Arc::new(executor),
            meta,
            families,
            drivers: Vec::new(),
            end_tx,
            end_rx: Some(end_rx),
            trade_prevented,
            capacity_penalty: 0,
            last_alive_ms: 0,
        }
    }

    /// Capacity ceiling after permanent penalties.
    #[must_use]
    pub fn effective_max_trades(&self) -> usize {
        self.engine
            .max_concurrent_trades
            .saturating_sub(self.capacity_penalty)
    }

    #[must_use]
    pub fn open_trades(&self) -> usize {
        self.drivers.len()
    }

    #[must_use]
    pub const fn pnl(&self) -> &PnlAggregator {
        &self.pnl
    }

    /// Serialized handler for one feed event.
    pub fn on_kline(&mut self, pair: &str, kline: &Kline) {
        let now = kline.end;

        if pair == self.engine.btc_pair {
            self.trend.on_kline(kline);
            return;
        }

        for handle in &self.drivers {
            if handle.pair == pair {
                handle.send_kline(kline);
            }
        }

        let gates = DetectionGates {
            trend: &self.trend,
            families: self.families.as_ref(),
        };
        let mut triggered: Vec<(ConfData, TradeDriverOpts)> = Vec::new();
        for watcher in self.collection.get_or_create(pair) {
            watcher.on_kline(kline);
            if watcher.detect_flash_wick(&gates) {
                triggered.push((watcher.conf_data(), watcher.trade_opts().clone()));
            }
        }

        for (conf, trade_opts) in triggered {
            self.launch(conf, trade_opts, kline.close, now);
        }

        self.log_alive(now);
    }

    /// Gate order: prevention flag, capacity, inhibition. The inhibition
    /// window is only claimed once the trade is actually going to launch.
    fn launch(&mut self, conf: ConfData, trade_opts: TradeDriverOpts, mark_price: f64, now: i64) {
        let line = conf.line();

        if *self.trade_prevented.borrow() {
            tracing::debug!(%line, "detection dropped, trading prevented");
            return;
        }
        if self.drivers.len() >= self.effective_max_trades() {
            tracing::info!(
                %line,
                open = self.drivers.len(),
                max = self.effective_max_trades(),
                "detection dropped, at capacity"
            );
            return;
        }
        let quote_amount = match &self.sizing {
            Some(sizing) => sizing.get_investment(&conf),
            None => trade_opts.quote_amount,
        };
        if quote_amount <= 0.0 {
            tracing::warn!(%line, quote_amount, "detection dropped, sizing exhausted");
            return;
        }
        if !self.inhibitor.try_acquire(&line, now) {
            tracing::debug!(%line, "detection dropped, inhibited");
            return;
        }

        let mut driver = TradeDriver::new(conf, trade_opts, quote_amount);
        driver.start(now);
        let handle = spawn_driver(
            driver,
            Arc::clone(&self.executor),
            Arc::clone(&self.meta),
            self.end_tx.clone(),
            mark_price,
            now,
        );
        tracing::info!(%line, id = %handle.id, quote_amount, mark_price, "trade launched");
        self.drivers.push(handle);
    }

    /// Processes the terminal message of a driver task.
    pub fn handle_trade_end(&mut self, end: TradeEnd) {
        let id = match &end {
            TradeEnd::Completed { result, .. } => result.info.id.clone(),
            TradeEnd::Failed { info, .. } => info.id.clone(),
        };
        self.drivers.retain(|handle| handle.id != id);

        match end {
            TradeEnd::Completed { conf, result } => {
                if let Some(sizing) = &mut self.sizing {
                    sizing.update_investment(&conf, &result);
                }
                self.pnl.record(&conf, &result);
                if let Err(err) = self.recorder.record_trade(&conf, &result) {
                    tracing::error!(%err, "trade artifact not written");
                }
                tracing::info!(
                    line = %conf.line(),
                    pnl = result.pnl(),
                    reason = %result.sell_reason,
                    "trade completed"
                );
            }
            TradeEnd::Failed { conf, info, error } => {
                if error.is_sell() {
                    self.capacity_penalty += 1;
                    tracing::error!(
                        line = %conf.line(),
                        id = %info.id,
                        %error,
                        max = self.effective_max_trades(),
                        "position stranded, trade capacity reduced"
                    );
                } else {
                    tracing::error!(line = %conf.line(), id = %info.id, %error, "buy failed");
                }
                if let Err(err) = self.recorder.record_failure(&conf, &info, &error) {
                    tracing::error!(%err, "failure report not written");
                }
            }
        }
    }

    /// Applies a reloaded configuration: the watcher set is reconciled in
    /// place, engine limits are refreshed. Open trades are never touched.
    pub fn apply_config(&mut self, config: AppConfig) {
        let report = self.collection.reconcile(config.watchers);
        for duration in self.collection.trend_durations() {
            self.trend.ensure(duration);
        }
        self.inhibitor.set_window(config.engine.inhibit_window_min);
        if config.engine.recorder_path != self.engine.recorder_path {
            self.recorder = TradeRecorder::new(&config.engine.recorder_path);
        }
        self.engine = config.engine;
        tracing::info!(
            added = report.added,
            removed = report.removed,
            kept = report.kept,
            max = self.effective_max_trades(),
            "configuration applied"
        );
    }

    /// Arms the fixed-price watchers of the pair.
    pub fn set_fixed_price_target(&mut self, pair: &str, price: f64) {
        for watcher in self.collection.get_or_create(pair) {
            if let Some(fixed) = watcher.as_fixed_price_mut() {
                fixed.set_target(price);
            }
        }
    }

    fn log_alive(&mut self, now: i64) {
        if self.last_alive_ms == 0 {
            self.last_alive_ms = now;
            return;
        }
        let ttl_ms = i64::from(self.engine.alive_ttl_min) * MINUTE_MS;
        if now - self.last_alive_ms < ttl_ms {
            return;
        }
        self.inhibitor.prune(now);
        tracing::info!(
            open_trades = self.drivers.len(),
            pairs = self.collection.pair_count(),
            watchers = self.collection.watcher_count(),
            inhibited = self.inhibitor.len(),
            summary = %self.pnl.summary(),
            "alive"
        );
        self.last_alive_ms = now;
    }

    /// Drives the engine until the feed is exhausted, then waits for the
    /// remaining open trades to finish.
    ///
    /// # Errors
    ///
    /// Returns an error when the feed fails or the orchestrator is already
    /// running.
    pub async fn run(
        &mut self,
        feed: &mut dyn Feed,
        mut config_rx: watch::Receiver<AppConfig>,
    ) -> Result<()> {
        let mut end_rx = self
            .end_rx
            .take()
            .ok_or_else(|| anyhow!("orchestrator is already running"))?;
        let mut config_open = true;

        loop {
            tokio::select! {
                msg = feed.next_kline() => match msg? {
                    Some((pair, kline)) => self.on_kline(&pair, &kline),
                    None => break,
                },
                Some(end) = end_rx.recv() => self.handle_trade_end(end),
                changed = config_rx.changed(), if config_open => {
                    if changed.is_ok() {
                        let config = config_rx.borrow_and_update().clone();
                        self.apply_config(config);
                    } else {
                        config_open = false;
                    }
                }
            }
        }

        // dropping the handles closes the kline channels, which winds the
        // remaining driver tasks down through their sell legs
        let open = std::mem::take(&mut self.drivers);
        let open_count = open.len();
        tracing::info!(open_trades = open_count, "feed exhausted, draining");
        drop(open);
        for _ in 0..open_count {
            match end_rx.recv().await {
                Some(end) => self.handle_trade_end(end),
                None => break,
            }
        }
        self.end_rx = Some(end_rx);
        tracing::info!(summary = %self.pnl.summary(), "engine stopped");
        Ok(())
    }
}
