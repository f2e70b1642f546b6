use flash_wick_core::{ConfData, Sizing, TradeResult};
use std::collections::HashMap;

/// Flat sizing: every trade commits the same quote amount.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizing {
    amount: f64,
}

impl FixedSizing {
    #[must_use]
    pub const fn new(amount: f64) -> Self {
        Self { amount }
    }
}

impl Sizing for FixedSizing {
    fn get_investment(&self, _conf: &ConfData) -> f64 {
        self.amount
    }

    fn update_investment(&mut self, _conf: &ConfData, _result: &TradeResult) {}
}

/// Sizes each configuration from its own realized performance: the base
/// amount plus half its cumulative profit, rounded up.
///
/// Losing configurations shrink toward zero; the orchestrator refuses to
/// open trades once the size is no longer positive.
#[derive(Debug)]
pub struct AdaptiveSizing {
    base: f64,
    pnl_by_key: HashMap<String, f64>,
}

impl AdaptiveSizing {
    pub const DEFAULT_BASE: f64 = 100.0;

    #[must_use]
    pub fn new(base: f64) -> Self {
        Self {
            base,
            pnl_by_key: HashMap::new(),
        }
    }
}

impl Sizing for AdaptiveSizing {
    fn get_investment(&self, conf: &ConfData) -> f64 {
        let pnl = self
            .pnl_by_key
            .get(&conf.profile_key())
            .copied()
            .unwrap_or(0.0);
        (self.base + pnl / 2.0).ceil()
    }

    fn update_investment(&mut self, conf: &ConfData, result: &TradeResult) {
        *self.pnl_by_key.entry(conf.profile_key()).or_insert(0.0) += result.pnl();
    }
}
