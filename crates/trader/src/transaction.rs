use crate::error::TradeError;
use flash_wick_core::{BuyFill, ExchangeExecutor, SellFill};

/// Upper bound on sell submissions for one position.
pub const MAX_SELL_ATTEMPTS: u32 = 3;

/// Remediation label recorded when a sell succeeded by replaying the
/// exchange-reported quantity string.
pub const EXACT_QTY_STRATEGY: &str = "exact-qty";

/// Floors an amount to the pair's base-asset precision. Selling a rounded-up
/// quantity would be rejected for exceeding the balance.
#[must_use]
pub fn round_down(amount: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    (amount * factor).floor() / factor
}

/// Decimal string for a sell order, floored to the pair's precision.
#[must_use]
pub fn sell_quantity_string(amount: f64, precision: u32) -> String {
    format!(
        "{:.prec$}",
        round_down(amount, precision),
        prec = precision as usize
    )
}

/// Runs the entry leg once. Buy failures commit no funds, so there is no
/// retry loop on this side.
pub async fn execute_buy<E: ExchangeExecutor + ?Sized>(
    executor: &E,
    pair: &str,
    quote_amount: f64,
    mark_price: f64,
) -> Result<BuyFill, TradeError> {
    executor
        .buy(pair, quote_amount, mark_price)
        .await
        .map_err(TradeError::buy)
}

/// Runs the exit leg with bounded retries.
///
/// All regular attempts sell the floored quantity. When they are
/// exhausted and the last rejection was a LOT_SIZE error, one final
/// attempt replays the exact quantity string the exchange reported at buy
/// time. Returns the fill and the remediation strategy used, if any.
pub async fn execute_sell<E: ExchangeExecutor + ?Sized>(
    executor: &E,
    pair: &str,
    amount: f64,
    executed_qty_raw: &str,
    precision: u32,
    mark_price: f64,
) -> Result<(SellFill, Option<String>), TradeError> {
    let quantity = sell_quantity_string(amount, precision);
    let mut last_error = None;

    for attempt in 1..=MAX_SELL_ATTEMPTS {
        match executor.sell(pair, &quantity, mark_price).await {
            Ok(fill) => {
                if attempt > 1 {
                    tracing::info!(%pair, attempt, "sell succeeded after retry");
                }
                return Ok((fill, None));
            }
            Err(err) => {
                tracing::warn!(%pair, attempt, %quantity, error = %err, "sell attempt failed");
                last_error = Some(err);
            }
        }
    }

    // loop always sets last_error before falling through
    let source = last_error.unwrap_or_else(|| {
        flash_wick_core::ExecutorError::InvalidResponse("no sell attempt recorded".to_string())
    });
    if !source.is_lot_size() {
        return Err(TradeError::sell(MAX_SELL_ATTEMPTS, source));
    }

    // the floored quantity keeps tripping the lot-size filter; replay the
    // quantity string the exchange itself reported for the buy fill
    tracing::warn!(%pair, quantity = %executed_qty_raw, "lot-size rejections, trying exact quantity");
    match executor.sell(pair, executed_qty_raw, mark_price).await {
        Ok(fill) => Ok((fill, Some(EXACT_QTY_STRATEGY.to_string()))),
        Err(err) => Err(TradeError::sell(MAX_SELL_ATTEMPTS + 1, err)),
    }
}
