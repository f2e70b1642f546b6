use crate::driver::TradeDriver;
use crate::error::TradeError;
use crate::executor::ExecutorWrapper;
use crate::transaction;
use flash_wick_core::{
    ConfData, Kline, SellFill, SellReason, SymbolMeta, TradeInfo, TradeResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Kline fan-out buffer per open trade.
const KLINE_CHANNEL_CAPACITY: usize = 64;

/// Terminal message of a driver task. Exactly one is sent per trade.
#[derive(Debug)]
pub enum TradeEnd {
    Completed {
        conf: ConfData,
        result: TradeResult,
    },
    Failed {
        conf: ConfData,
        info: TradeInfo,
        error: TradeError,
    },
}

impl TradeEnd {
    #[must_use]
    pub const fn conf(&self) -> &ConfData {
        match self {
            Self::Completed { conf, .. } | Self::Failed { conf, .. } => conf,
        }
    }
}

/// Handle the orchestrator keeps for each open trade.
#[derive(Debug)]
pub struct DriverHandle {
    pub id: String,
    pub pair: String,
    pub conf: ConfData,
    kline_tx: mpsc::Sender<Kline>,
}

impl DriverHandle {
    /// Forwards a kline to the driver task. Lagging or finished tasks drop
    /// the tick rather than stall the event loop.
    pub fn send_kline(&self, msg: &Kline) {
        if let Err(err) = self.kline_tx.try_send(msg.clone()) {
            tracing::debug!(pair = %self.pair, id = %self.id, %err, "kline dropped");
        }
    }
}

/// Spawns the async runner around a started driver.
///
/// `mark_price` and `now_ms` come from the kline that triggered the trade.
/// The task executes the buy leg, evaluates exits on every forwarded
/// kline, backstops the hold timeout with a wall-clock timer for quiet
/// feeds, runs the sell leg and reports exactly one [`TradeEnd`].
pub fn spawn_driver(
    mut driver: TradeDriver,
    executor: Arc<ExecutorWrapper>,
    meta: Arc<dyn SymbolMeta>,
    end_tx: mpsc::Sender<TradeEnd>,
    mark_price: f64,
    now_ms: i64,
) -> DriverHandle {
    let (kline_tx, kline_rx) = mpsc::channel(KLINE_CHANNEL_CAPACITY);
    let handle = DriverHandle {
        id: driver.info().id.clone(),
        pair: driver.pair().to_string(),
        conf: driver.conf().clone(),
        kline_tx,
    };

    tokio::spawn(async move {
        let end = run(
            &mut driver,
            &executor,
            meta.as_ref(),
            kline_rx,
            mark_price,
            now_ms,
        )
        .await;
        if end_tx.send(end).await.is_err() {
            tracing::warn!(pair = %driver.pair(), "orchestrator gone, trade end dropped");
        }
    });

    handle
}

async fn run(
    driver: &mut TradeDriver,
    executor: &ExecutorWrapper,
    meta: &dyn SymbolMeta,
    mut kline_rx: mpsc::Receiver<Kline>,
    mark_price: f64,
    now_ms: i64,
) -> TradeEnd {
    let pair = driver.pair().to_string();
    let quote_amount = driver.info().quote_amount;

    let fill = match transaction::execute_buy(executor, &pair, quote_amount, mark_price).await {
        Ok(fill) => fill,
        Err(error) => {
            return TradeEnd::Failed {
                conf: driver.conf().clone(),
                info: driver.info().clone(),
                error,
            }
        }
    };
    let buy_only = driver.on_buy_fill(&fill, now_ms);

    if let Some(reason) = buy_only {
        // no exit leg: close at the entry fill
        let result = driver.on_sell_fill(
            &SellFill {
                amount: fill.executed_qty,
                price: fill.price,
                done_timestamp: fill.done_timestamp,
            },
            reason,
            None,
        );
        return TradeEnd::Completed {
            conf: driver.conf().clone(),
            result,
        };
    }

    let mut last_close = fill.price;
    let mut last_end = now_ms;
    let hold_timer = tokio::time::sleep(Duration::from_millis(
        driver.opts().sell_after_ms.max(0) as u64,
    ));
    tokio::pin!(hold_timer);

    let reason = loop {
        tokio::select! {
            msg = kline_rx.recv() => match msg {
                Some(kline) => {
                    last_close = kline.close;
                    last_end = kline.end;
                    if let Some(reason) = driver.evaluate(&kline) {
                        break reason;
                    }
                }
                None => {
                    tracing::info!(%pair, "kline feed closed, liquidating");
                    break driver
                        .trigger_sell(SellReason::FeedClosed, last_end)
                        .unwrap_or(SellReason::FeedClosed);
                }
            },
            () = &mut hold_timer => {
                break driver
                    .trigger_sell(SellReason::Timeout, last_end)
                    .unwrap_or(SellReason::Timeout);
            }
        }
    };

    let precision = meta.base_asset_precision(&pair);
    match transaction::execute_sell(
        executor,
        &pair,
        driver.info().amount,
        &fill.executed_qty_raw,
        precision,
        last_close,
    )
    .await
    {
        Ok((sell_fill, strategy)) => TradeEnd::Completed {
            conf: driver.conf().clone(),
            result: driver.on_sell_fill(&sell_fill, reason, strategy),
        },
        Err(error) => TradeEnd::Failed {
            conf: driver.conf().clone(),
            info: driver.info().clone(),
            error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SimulatedExecutor;
    use flash_wick_core::{TradeDriverOpts, WatcherKind, MINUTE_MS};

    struct FixedPrecision;

    impl SymbolMeta for FixedPrecision {
        fn base_asset_precision(&self, _pair: &str) -> u32 {
            8
        }
    }

    fn conf() -> ConfData {
        ConfData {
            kind: WatcherKind::Price,
            pair: "ETHUSDT".to_string(),
            config: "test".to_string(),
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

    fn started_driver(opts: TradeDriverOpts) -> TradeDriver {
        let mut driver = TradeDriver::new(conf(), opts, 100.0);
        assert!(driver.start(0));
        driver
    }

    #[tokio::test]
    async fn direct_take_profit_completes_the_trade() {
        let executor = Arc::new(ExecutorWrapper::Simulated(SimulatedExecutor::instant()));
        let (end_tx, mut end_rx) = mpsc::channel(1);
        let driver = started_driver(TradeDriverOpts {
            sell_direct: true,
            ..TradeDriverOpts::default()
        });

        let handle = spawn_driver(driver, executor, Arc::new(FixedPrecision), end_tx, 100.0, 0);
        handle.send_kline(&tick(MINUTE_MS, 110.0));

        match end_rx.recv().await.unwrap() {
            TradeEnd::Completed { conf, result } => {
                assert_eq!(conf.pair, "ETHUSDT");
                assert_eq!(result.sell_reason, SellReason::Direct);
                assert!((result.sold_price - 110.0).abs() < f64::EPSILON);
                assert!(result.pnl() > 0.0);
            }
            TradeEnd::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn buy_only_trade_ends_without_selling() {
        let executor = Arc::new(ExecutorWrapper::Simulated(SimulatedExecutor::instant()));
        let (end_tx, mut end_rx) = mpsc::channel(1);
        let driver = started_driver(TradeDriverOpts {
            buy_only: true,
            ..TradeDriverOpts::default()
        });

        let _handle = spawn_driver(driver, executor, Arc::new(FixedPrecision), end_tx, 50.0, 0);
        match end_rx.recv().await.unwrap() {
            TradeEnd::Completed { result, .. } => {
                assert_eq!(result.sell_reason, SellReason::BuyOnly);
                assert!((result.sold_price - 50.0).abs() < f64::EPSILON);
            }
            TradeEnd::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn closed_kline_channel_liquidates_on_the_kline_clock() {
        let executor = Arc::new(ExecutorWrapper::Simulated(SimulatedExecutor::instant()));
        let (end_tx, mut end_rx) = mpsc::channel(1);
        let driver = started_driver(TradeDriverOpts::default());

        let handle = spawn_driver(driver, executor, Arc::new(FixedPrecision), end_tx, 100.0, 0);
        handle.send_kline(&tick(MINUTE_MS, 100.0));
        drop(handle);

        match end_rx.recv().await.unwrap() {
            TradeEnd::Completed { result, .. } => {
                assert_eq!(result.sell_reason, SellReason::FeedClosed);
                // the forced exit goes through the state machine and stamps
                // the last kline the driver saw
                assert_eq!(result.info.sell_timestamp, MINUTE_MS);
            }
            TradeEnd::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_feed_hits_the_wall_clock_timeout() {
        let executor = Arc::new(ExecutorWrapper::Simulated(SimulatedExecutor::instant()));
        let (end_tx, mut end_rx) = mpsc::channel(1);
        let driver = started_driver(TradeDriverOpts {
            sell_after_ms: 1_000,
            ..TradeDriverOpts::default()
        });

        let _handle = spawn_driver(driver, executor, Arc::new(FixedPrecision), end_tx, 100.0, 0);
        // no klines at all; paused time jumps straight to the timer
        match end_rx.recv().await.unwrap() {
            TradeEnd::Completed { result, .. } => {
                assert_eq!(result.sell_reason, SellReason::Timeout);
            }
            TradeEnd::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }
}
