pub mod signals;
pub mod book_imbalance;

pub use signals::{BookTop, Decision, ImbalanceConfig, ImbalanceSignalEngine};
pub use book_imbalance::{OrderBookImbalance, OrderBookImbalanceConfig, StrategyState};
