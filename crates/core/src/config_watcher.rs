use crate::config::AppConfig;
use crate::config_loader::ConfigLoader;
use anyhow::{Context, Result};
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tokio::sync::watch;

/// Editors save a config file as a burst of modify events; wait this long
/// after the last one before reloading.
const RELOAD_QUIET_PERIOD: Duration = Duration::from_millis(250);

/// Watches the configuration file and broadcasts reloaded configurations.
///
/// The orchestrator subscribes to the receiver and runs a watcher
/// reconciliation pass whenever a new configuration arrives. A file change
/// that no longer parses keeps the previous configuration in effect.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
}

impl ConfigWatcher {
    /// Creates a new configuration watcher seeded with the initial config.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    #[must_use]
    pub fn new(initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    /// Watches the configuration file until every receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be watched.
    pub async fn watch(&self, config_path: &str) -> Result<()> {
        let tx = self.tx.clone();
        let config_path = config_path.to_string();
        tokio::task::spawn_blocking(move || reload_loop(&tx, &config_path)).await?
    }
}

fn reload_loop(tx: &watch::Sender<AppConfig>, config_path: &str) -> Result<()> {
    let (modified_tx, modified_rx) = mpsc::channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if event.kind.is_modify() => {
            let _ = modified_tx.send(());
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "config file watch event failed"),
    })
    .context("starting config file watcher")?;
    watcher
        .watch(Path::new(config_path), RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {config_path}"))?;

    while modified_rx.recv().is_ok() {
        // coalesce the burst, then reload once
        loop {
            match modified_rx.recv_timeout(RELOAD_QUIET_PERIOD) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
        match ConfigLoader::load_from(config_path) {
            Ok(config) => {
                if tx.send(config).is_err() {
                    tracing::debug!("all config receivers dropped, watcher stopping");
                    return Ok(());
                }
                tracing::info!(path = %config_path, "configuration reloaded");
            }
            Err(err) => {
                tracing::error!(%err, "configuration reload failed, keeping the current one");
            }
        }
    }

    Ok(())
}
