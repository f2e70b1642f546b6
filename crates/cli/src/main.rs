use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flash_wick_core::{ConfigLoader, ConfigWatcher, Feed};
use flash_wick_orchestrator::Orchestrator;
use flash_wick_trader::{ExecutorWrapper, SimulatedExecutor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

mod feed;
mod meta;

use feed::JsonlFeed;
use meta::SymbolTable;

#[derive(Parser)]
#[command(name = "flash-wick")]
#[command(about = "Flash-wick detection and automated trading engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run against a JSONL kline stream on stdin
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Symbol reference data (precision, volume families), JSON
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Replay a captured JSONL kline file
    Replay {
        /// Capture file, one JSON event per line
        #[arg(short, long)]
        data: String,
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Symbol reference data (precision, volume families), JSON
        #[arg(long)]
        symbols: Option<String>,
        /// Arm a fixed-price watcher, PAIR=PRICE (repeatable)
        #[arg(long = "fixed-target")]
        fixed_targets: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config, symbols } => {
            let mut feed = JsonlFeed::stdin();
            run_engine(&config, symbols.as_deref(), &[], &mut feed).await?;
        }
        Commands::Replay {
            data,
            config,
            symbols,
            fixed_targets,
        } => {
            let mut feed = JsonlFeed::open(&data).await?;
            run_engine(&config, symbols.as_deref(), &fixed_targets, &mut feed).await?;
        }
    }

    Ok(())
}

async fn run_engine(
    config_path: &str,
    symbols: Option<&str>,
    fixed_targets: &[String],
    feed: &mut dyn Feed,
) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    if config.engine.production {
        anyhow::bail!("production mode requires a live exchange backend, none is built in");
    }

    let table = Arc::new(match symbols {
        Some(path) => SymbolTable::load(path)?,
        None => SymbolTable::default(),
    });
    let executor = ExecutorWrapper::Simulated(SimulatedExecutor::new(Duration::from_millis(
        config.engine.simulation_latency_ms,
    )));

    // first interrupt stops opening new trades; running ones finish
    let (prevent_tx, prevent_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, new trades prevented");
            let _ = prevent_tx.send(true);
        }
    });

    let (config_watcher, config_rx) = ConfigWatcher::new(config.clone());
    let watched_path = config_path.to_string();
    tokio::spawn(async move {
        if let Err(err) = config_watcher.watch(&watched_path).await {
            tracing::error!(%err, "config watcher stopped");
        }
    });

    let mut orchestrator =
        Orchestrator::new(
            config,
            executor,
            Arc::clone(&table) as Arc<dyn flash_wick_core::SymbolMeta>,
            table as Arc<dyn flash_wick_core::VolumeFamilyProvider>,
            prevent_rx,
        );
    for target in fixed_targets {
        let (pair, price) = target
            .split_once('=')
            .with_context(|| format!("expected PAIR=PRICE, got {target}"))?;
        let price: f64 = price
            .parse()
            .with_context(|| format!("invalid target price in {target}"))?;
        orchestrator.set_fixed_price_target(pair, price);
    }

    orchestrator.run(feed, config_rx).await
}
