use flash_wick_core::MINUTE_MS;
use std::collections::HashMap;

/// Cooldown ledger for (pair, configuration) identities.
///
/// Once a conf line launches a trade it may not launch another until its
/// window expires, no matter how often the detector keeps firing.
#[derive(Debug)]
pub struct WatcherInhibitor {
    window_ms: i64,
    expiries: HashMap<String, i64>,
}

impl WatcherInhibitor {
    #[must_use]
    pub fn new(window_min: u32) -> Self {
        Self {
            window_ms: i64::from(window_min) * MINUTE_MS,
            expiries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn is_inhibited(&self, conf_line: &str, now_ms: i64) -> bool {
        self.expiries
            .get(conf_line)
            .is_some_and(|&expiry| now_ms < expiry)
    }

    /// Claims the conf line for one trade. Returns false without touching
    /// the window when the line is still cooling down.
    pub fn try_acquire(&mut self, conf_line: &str, now_ms: i64) -> bool {
        if self.is_inhibited(conf_line, now_ms) {
            return false;
        }
        self.expiries
            .insert(conf_line.to_string(), now_ms + self.window_ms);
        true
    }

    /// Applies a reloaded window to future acquisitions. Running cooldowns
    /// keep their original expiry.
    pub fn set_window(&mut self, window_min: u32) {
        self.window_ms = i64::from(window_min) * MINUTE_MS;
    }

    /// Drops expired entries so the ledger does not grow with pair churn.
    pub fn prune(&mut self, now_ms: i64) {
        self.expiries.retain(|_, &mut expiry| now_ms < expiry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}
