pub mod data;
pub mod error;
pub mod host;
pub mod strategy;
pub mod utils;

// Re-export commonly used types
pub use data::{
    BookAction, BookType, Instrument, LimitOrder, MarketEvent, OrderBook, OrderBookDelta,
    PriceLevel, QuoteTick, Side, TimeInForce,
};
pub use error::{ImbalanceError, StrategyError};
pub use host::{PaperHost, StrategyHost, Subscription};
pub use strategy::{
    BookTop, Decision, ImbalanceConfig, ImbalanceSignalEngine, OrderBookImbalance,
    OrderBookImbalanceConfig, StrategyState,
};
pub use utils::{Config, StrategyMetrics};
