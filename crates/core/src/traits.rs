use crate::kline::Kline;
use crate::types::{ConfData, TradeResult};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Exchange rejection code for quantity precision / step-size violations.
pub const LOT_SIZE_CODE: i32 = -1013;

/// Errors surfaced by an exchange execution backend.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Network-level failure (connection, DNS, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Order rejected by the exchange with a structured body.
    #[error("order rejected: {code} - {message}")]
    Rejected {
        /// Exchange error code (e.g. -1013 for LOT_SIZE).
        code: i32,
        /// Error message from the exchange.
        message: String,
    },

    /// Response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ExecutorError {
    /// Creates a rejection error from a structured exchange body.
    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// True for a quantity precision rejection, which the sell leg can
    /// remediate by replaying the exact purchased quantity string.
    #[must_use]
    pub const fn is_lot_size(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                code: LOT_SIZE_CODE,
                ..
            }
        )
    }
}

/// Outcome of a filled buy order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    /// Quote currency actually spent across fills.
    pub executed_quote_amount: f64,
    /// Average fill price.
    pub price: f64,
    /// Base-asset quantity bought.
    pub executed_qty: f64,
    /// Exchange-reported quantity string, kept verbatim for lot-size
    /// remediation.
    pub executed_qty_raw: String,
    pub done_timestamp: i64,
}

/// Outcome of a filled sell order.
#[derive(Debug, Clone, PartialEq)]
pub struct SellFill {
    /// Base-asset quantity sold.
    pub amount: f64,
    /// Average fill price.
    pub price: f64,
    pub done_timestamp: i64,
}

/// One asynchronous "execute trade leg" backend. Both the simulated path
/// and the real exchange client implement this contract; the trade state
/// machine depends only on it.
#[async_trait]
pub trait ExchangeExecutor: Send + Sync {
    /// Market-buys `quote_amount` worth of the pair. `mark_price` is the
    /// last close seen by the caller, used by simulated backends.
    async fn buy(
        &self,
        pair: &str,
        quote_amount: f64,
        mark_price: f64,
    ) -> Result<BuyFill, ExecutorError>;

    /// Market-sells `quantity` (decimal string) of the pair.
    async fn sell(
        &self,
        pair: &str,
        quantity: &str,
        mark_price: f64,
    ) -> Result<SellFill, ExecutorError>;
}

/// Source of `(pair, kline)` events in arrival order.
#[async_trait]
pub trait Feed: Send {
    /// Next event, or `None` when the stream is exhausted.
    async fn next_kline(&mut self) -> Result<Option<(String, Kline)>>;
}

/// Symbol metadata needed to round sell quantities.
pub trait SymbolMeta: Send + Sync {
    /// Base-asset precision (decimal places) for the pair.
    fn base_asset_precision(&self, pair: &str) -> u32;
}

/// Reference/classification collaborator used only as a detection filter.
pub trait VolumeFamilyProvider: Send + Sync {
    fn volume_family(&self, pair: &str) -> Option<String>;
}

/// Investment sizing collaborator keyed by watcher identity.
pub trait Sizing: Send {
    fn get_investment(&self, conf: &ConfData) -> f64;
    fn update_investment(&mut self, conf: &ConfData, result: &TradeResult);
}
