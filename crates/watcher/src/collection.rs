use crate::fixed_price::FixedPriceWatcher;
use crate::price::PriceWatcher;
use crate::volume::VolumeWatcher;
use crate::watcher::MarketWatcher;
use flash_wick_core::{Kline, WatcherProfile};
use std::collections::{HashMap, HashSet};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
}

/// All live watchers, keyed by pair. Pairs are materialized lazily the
/// first time a kline for them arrives; each pair gets one watcher per
/// configured profile.
pub struct WatcherCollection {
    profiles: Vec<WatcherProfile>,
    watchers: HashMap<String, Vec<MarketWatcher>>,
}

impl WatcherCollection {
    #[must_use]
    pub fn new(profiles: Vec<WatcherProfile>) -> Self {
        Self {
            profiles,
            watchers: HashMap::new(),
        }
    }

    /// Watchers for the pair, instantiating them from the profile set on
    /// first sight.
    pub fn get_or_create(&mut self, pair: &str) -> &mut Vec<MarketWatcher> {
        let profiles = &self.profiles;
        self.watchers.entry(pair.to_string()).or_insert_with(|| {
            let created: Vec<MarketWatcher> = profiles
                .iter()
                .filter_map(|profile| build_watcher(profile, pair))
                .collect();
            tracing::debug!(%pair, count = created.len(), "materialized watchers for new pair");
            created
        })
    }

    /// Routes a kline to the pair's watchers without running detection.
    pub fn on_kline(&mut self, pair: &str, msg: &Kline) {
        for watcher in self.get_or_create(pair) {
            watcher.on_kline(msg);
        }
    }

    /// Diffs the live watcher set against a new desired profile set.
    ///
    /// Watchers whose profile survives keep their buffered state; removed
    /// profiles drop their watchers; new profiles are instantiated for
    /// every known pair. Open trades are not touched, they belong to the
    /// orchestrator.
    pub fn reconcile(&mut self, desired: Vec<WatcherProfile>) -> ReconcileReport {
        let desired_keys: HashSet<String> = desired.iter().map(profile_key).collect();
        let mut report = ReconcileReport::default();

        for (pair, list) in &mut self.watchers {
            list.retain(|watcher| {
                let keep = desired_keys.contains(&watcher.conf_data().profile_key());
                if keep {
                    report.kept += 1;
                } else {
                    report.removed += 1;
                }
                keep
            });

            let existing: HashSet<String> = list
                .iter()
                .map(|watcher| watcher.conf_data().profile_key())
                .collect();
            for profile in &desired {
                if !existing.contains(&profile_key(profile)) {
                    if let Some(watcher) = build_watcher(profile, pair) {
                        list.push(watcher);
                        report.added += 1;
                    }
                }
            }
        }

        self.profiles = desired;
        tracing::info!(
            added = report.added,
            removed = report.removed,
            kept = report.kept,
            "watcher set reconciled"
        );
        report
    }

    /// Distinct BTC trend windows the configured profiles gate on.
    #[must_use]
    pub fn trend_durations(&self) -> Vec<u32> {
        let mut durations: Vec<u32> = self
            .profiles
            .iter()
            .filter_map(|profile| match profile {
                WatcherProfile::Price { opts, .. } => opts.follow_btc_trend.duration_minutes(),
                WatcherProfile::Volume { opts, .. } => opts.follow_btc_trend.duration_minutes(),
                WatcherProfile::FixedPrice { .. } => None,
            })
            .collect();
        durations.sort_unstable();
        durations.dedup();
        durations
    }

    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.watchers.len()
    }

    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.values().map(Vec::len).sum()
    }
}

fn build_watcher(profile: &WatcherProfile, pair: &str) -> Option<MarketWatcher> {
    match profile {
        WatcherProfile::Price { opts, trade } => Some(MarketWatcher::Price(PriceWatcher::new(
            pair,
            opts.clone(),
            trade.clone(),
        ))),
        WatcherProfile::Volume { opts, trade } => Some(MarketWatcher::Volume(
            VolumeWatcher::new(pair, opts.clone(), trade.clone()),
        )),
        WatcherProfile::FixedPrice { opts, trade } => {
            // only armed for the pairs it names
            if opts.pairs.iter().any(|p| p == pair) {
                Some(MarketWatcher::FixedPrice(FixedPriceWatcher::from_opts(
                    pair,
                    opts,
                    trade.clone(),
                )))
            } else {
                None
            }
        }
    }
}

/// Pair-independent identity of a profile, matching
/// `ConfData::profile_key` for the watcher it builds.
fn profile_key(profile: &WatcherProfile) -> String {
    match profile {
        WatcherProfile::Price { opts, trade } => format!(
            "price {}-{}",
            opts.config_fragment(),
            trade.config_fragment()
        ),
        WatcherProfile::Volume { opts, trade } => format!(
            "volume {}-{}",
            opts.config_fragment(),
            trade.config_fragment()
        ),
        WatcherProfile::FixedPrice { trade, .. } => {
            format!("fixed-price {}", trade.config_fragment())
        }
    }
}
