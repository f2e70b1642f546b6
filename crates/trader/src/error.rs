use flash_wick_core::ExecutorError;
use thiserror::Error;

/// Terminal failure of a trade leg.
#[derive(Debug, Error)]
pub enum TradeError {
    /// The entry order failed. No funds are committed.
    #[error("buy order failed: {source}")]
    Buy {
        #[source]
        source: ExecutorError,
    },

    /// Every sell attempt failed. The position is stranded and the caller
    /// must reduce its trading capacity.
    #[error("sell order failed after {attempts} attempts: {source}")]
    Sell {
        attempts: u32,
        #[source]
        source: ExecutorError,
    },
}

impl TradeError {
    pub fn buy(source: ExecutorError) -> Self {
        Self::Buy { source }
    }

    pub fn sell(attempts: u32, source: ExecutorError) -> Self {
        Self::Sell { attempts, source }
    }

    /// True when the failure stranded a bought position.
    #[must_use]
    pub const fn is_sell(&self) -> bool {
        matches!(self, Self::Sell { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sell_error_reports_attempt_count() {
        let err = TradeError::sell(3, ExecutorError::Timeout("sell ETHUSDT".to_string()));
        assert!(err.is_sell());
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn buy_error_does_not_strand_funds() {
        let err = TradeError::buy(ExecutorError::Network("refused".to_string()));
        assert!(!err.is_sell());
    }
}
