use async_trait::async_trait;
use flash_wick_core::{BuyFill, ExchangeExecutor, ExecutorError, SellFill};
use std::sync::Arc;
use std::time::Duration;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Execution backend that fills every order at the caller's mark price
/// after a fixed latency. The default path outside production.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    latency: Duration,
}

impl SimulatedExecutor {
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// Zero-latency variant used for live-vs-simulated fill comparison.
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }
}

#[async_trait]
impl ExchangeExecutor for SimulatedExecutor {
    async fn buy(
        &self,
        pair: &str,
        quote_amount: f64,
        mark_price: f64,
    ) -> Result<BuyFill, ExecutorError> {
        tokio::time::sleep(self.latency).await;
        if mark_price <= 0.0 {
            return Err(ExecutorError::InvalidResponse(format!(
                "non-positive mark price for {pair}: {mark_price}"
            )));
        }
        let executed_qty = quote_amount / mark_price;
        Ok(BuyFill {
            executed_quote_amount: quote_amount,
            price: mark_price,
            executed_qty,
            executed_qty_raw: format!("{executed_qty:.8}"),
            done_timestamp: now_ms(),
        })
    }

    async fn sell(
        &self,
        pair: &str,
        quantity: &str,
        mark_price: f64,
    ) -> Result<SellFill, ExecutorError> {
        tokio::time::sleep(self.latency).await;
        let amount: f64 = quantity.parse().map_err(|_| {
            ExecutorError::InvalidResponse(format!("unparsable sell quantity for {pair}: {quantity}"))
        })?;
        Ok(SellFill {
            amount,
            price: mark_price,
            done_timestamp: now_ms(),
        })
    }
}

/// Execution dispatch for the two deployment modes.
///
/// In live mode the buy leg also runs an instant simulated fill and logs
/// the price delta, keeping a running comparison between the two paths.
#[derive(Clone)]
pub enum ExecutorWrapper {
    Simulated(SimulatedExecutor),
    Live(Arc<dyn ExchangeExecutor>),
}

impl ExecutorWrapper {
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

#[async_trait]
impl ExchangeExecutor for ExecutorWrapper {
    async fn buy(
        &self,
        pair: &str,
        quote_amount: f64,
        mark_price: f64,
    ) -> Result<BuyFill, ExecutorError> {
        match self {
            Self::Simulated(sim) => sim.buy(pair, quote_amount, mark_price).await,
            Self::Live(live) => {
                let reference = SimulatedExecutor::instant();
                let (fill, simulated) = tokio::join!(
                    live.buy(pair, quote_amount, mark_price),
                    reference.buy(pair, quote_amount, mark_price),
                );
                let fill = fill?;
                if let Ok(simulated) = simulated {
                    tracing::info!(
                        %pair,
                        live_price = fill.price,
                        simulated_price = simulated.price,
                        delta = fill.price - simulated.price,
                        "live fill vs simulated fill"
                    );
                }
                Ok(fill)
            }
        }
    }

    async fn sell(
        &self,
        pair: &str,
        quantity: &str,
        mark_price: f64,
    ) -> Result<SellFill, ExecutorError> {
        match self {
            Self::Simulated(sim) => sim.sell(pair, quantity, mark_price).await,
            Self::Live(live) => live.sell(pair, quantity, mark_price).await,
        }
    }
}
