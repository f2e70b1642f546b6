pub mod driver;
pub mod error;
pub mod executor;
pub mod runner;
pub mod transaction;

pub use driver::{DriverState, TradeDriver};
pub use error::TradeError;
pub use executor::{ExecutorWrapper, SimulatedExecutor};
pub use runner::{spawn_driver, DriverHandle, TradeEnd};
pub use transaction::{execute_buy, execute_sell, sell_quantity_string, MAX_SELL_ATTEMPTS};
