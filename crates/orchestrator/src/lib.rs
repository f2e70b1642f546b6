pub mod inhibitor;
pub mod orchestrator;
pub mod pnl;
pub mod recorder;
pub mod sizing;

pub use inhibitor::WatcherInhibitor;
pub use orchestrator::Orchestrator;
pub use pnl::PnlAggregator;
pub use recorder::TradeRecorder;
pub use sizing::{AdaptiveSizing, FixedSizing};
