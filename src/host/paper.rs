use crate::data::{BookType, Instrument, LimitOrder};
use crate::host::StrategyHost;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// Market data subscription requested by a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    QuoteTicks(String),
    OrderBookDeltas(String, BookType),
    Ticker(String),
}

/// In-memory host that records every request
///
/// Orders are not matched: they are logged and kept for inspection. The
/// in-flight count is whatever the caller sets.
#[derive(Debug, Default)]
pub struct PaperHost {
    instruments: HashMap<String, Instrument>,
    subscriptions: Vec<Subscription>,
    orders: Vec<LimitOrder>,
    inflight: HashMap<String, usize>,
    cancel_requests: Vec<String>,
    close_requests: Vec<String>,
    reject_orders: bool,
}

impl PaperHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instrument in the host cache
    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.add_instrument(instrument);
        self
    }

    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.id.clone(), instrument);
    }

    pub fn set_inflight(&mut self, strategy_id: &str, count: usize) {
        self.inflight.insert(strategy_id.to_string(), count);
    }

    /// Make every subsequent submission fail
    pub fn set_reject_orders(&mut self, reject: bool) {
        self.reject_orders = reject;
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn orders(&self) -> &[LimitOrder] {
        &self.orders
    }

    pub fn cancel_requests(&self) -> &[String] {
        &self.cancel_requests
    }

    pub fn close_requests(&self) -> &[String] {
        &self.close_requests
    }
}

impl StrategyHost for PaperHost {
    fn instrument(&self, instrument_id: &str) -> Option<Instrument> {
        self.instruments.get(instrument_id).cloned()
    }

    fn subscribe_quote_ticks(&mut self, instrument_id: &str) -> Result<()> {
        debug!("Subscribed to quote ticks for {}", instrument_id);
        self.subscriptions
            .push(Subscription::QuoteTicks(instrument_id.to_string()));
        Ok(())
    }

    fn subscribe_order_book_deltas(
        &mut self,
        instrument_id: &str,
        book_type: BookType,
    ) -> Result<()> {
        debug!("Subscribed to {} deltas for {}", book_type, instrument_id);
        self.subscriptions
            .push(Subscription::OrderBookDeltas(instrument_id.to_string(), book_type));
        Ok(())
    }

    fn subscribe_ticker(&mut self, instrument_id: &str) -> Result<()> {
        debug!("Subscribed to ticker for {}", instrument_id);
        self.subscriptions
            .push(Subscription::Ticker(instrument_id.to_string()));
        Ok(())
    }

    fn submit_order(&mut self, order: LimitOrder) -> Result<()> {
        if self.reject_orders {
            return Err(anyhow!("Order {} rejected by paper host", order.client_order_id));
        }

        info!(
            "[PAPER] {:?} {} {} @ {} ({:?})",
            order.side, order.quantity, order.instrument_id, order.price, order.time_in_force
        );
        self.orders.push(order);
        Ok(())
    }

    fn orders_inflight(&self, strategy_id: &str) -> usize {
        self.inflight.get(strategy_id).copied().unwrap_or(0)
    }

    fn cancel_all_orders(&mut self, instrument_id: &str) -> Result<()> {
        info!("[PAPER] Cancel all orders for {}", instrument_id);
        self.cancel_requests.push(instrument_id.to_string());
        Ok(())
    }

    fn close_all_positions(&mut self, instrument_id: &str) -> Result<()> {
        info!("[PAPER] Close all positions for {}", instrument_id);
        self.close_requests.push(instrument_id.to_string());
        Ok(())
    }
}
