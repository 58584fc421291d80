pub mod config;
pub mod logger;
pub mod metrics;

pub use config::Config;
pub use logger::{init_logger, init_from_config};
pub use metrics::StrategyMetrics;
