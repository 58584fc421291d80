pub mod paper;

use crate::data::{BookType, Instrument, LimitOrder};
use anyhow::Result;

pub use paper::{PaperHost, Subscription};

/// Capabilities a hosting trading engine offers the strategy
///
/// The host owns market data delivery, order routing and the order/position
/// caches. The strategy only calls through this trait.
pub trait StrategyHost {
    /// Instrument definition from the host cache
    fn instrument(&self, instrument_id: &str) -> Option<Instrument>;

    fn subscribe_quote_ticks(&mut self, instrument_id: &str) -> Result<()>;

    fn subscribe_order_book_deltas(&mut self, instrument_id: &str, book_type: BookType)
        -> Result<()>;

    fn subscribe_ticker(&mut self, instrument_id: &str) -> Result<()>;

    fn submit_order(&mut self, order: LimitOrder) -> Result<()>;

    /// Number of orders submitted by `strategy_id` and not yet resolved
    fn orders_inflight(&self, strategy_id: &str) -> usize;

    fn cancel_all_orders(&mut self, instrument_id: &str) -> Result<()>;

    fn close_all_positions(&mut self, instrument_id: &str) -> Result<()>;
}
