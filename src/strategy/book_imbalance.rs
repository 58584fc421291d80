use crate::data::{
    BookType, Instrument, LimitOrder, MarketEvent, OrderBook, OrderBookDelta, QuoteTick, Side,
    TimeInForce,
};
use crate::error::{ImbalanceError, StrategyError};
use crate::host::StrategyHost;
use crate::strategy::{Decision, ImbalanceConfig, ImbalanceSignalEngine};
use crate::utils::metrics::StrategyMetrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

fn default_strategy_id() -> String {
    "OBI-001".to_string()
}

fn default_trigger_min_size() -> f64 {
    0.5
}

fn default_trigger_imbalance_ratio() -> f64 {
    0.4
}

/// Configuration for [`OrderBookImbalance`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookImbalanceConfig {
    /// Order id tag, unique among strategies running on one host
    #[serde(default = "default_strategy_id")]
    pub strategy_id: String,
    pub instrument_id: String,
    /// Max size per order (the resting size can be less)
    pub max_trade_size: Decimal,
    #[serde(default = "default_trigger_min_size")]
    pub trigger_min_size: f64,
    #[serde(default = "default_trigger_imbalance_ratio")]
    pub trigger_imbalance_ratio: f64,
    #[serde(default)]
    pub book_type: BookType,
    /// Feed on quote ticks with an L1 book instead of book deltas
    #[serde(default)]
    pub use_quote_ticks: bool,
    /// Also subscribe to ticker data
    #[serde(default)]
    pub subscribe_ticker: bool,
}

impl OrderBookImbalanceConfig {
    pub fn new(instrument_id: impl Into<String>, max_trade_size: Decimal) -> Self {
        Self {
            strategy_id: default_strategy_id(),
            instrument_id: instrument_id.into(),
            max_trade_size,
            trigger_min_size: default_trigger_min_size(),
            trigger_imbalance_ratio: default_trigger_imbalance_ratio(),
            book_type: BookType::default(),
            use_quote_ticks: false,
            subscribe_ticker: false,
        }
    }

    /// Quote-tick mode with the matching L1 book
    pub fn quote_ticks(mut self) -> Self {
        self.use_quote_ticks = true;
        self.book_type = BookType::L1Tbbo;
        self
    }

    pub fn validate(&self) -> Result<(), ImbalanceError> {
        if self.instrument_id.is_empty() {
            return Err(ImbalanceError::InvalidConfig("instrument_id is empty".into()));
        }
        if self.use_quote_ticks && self.book_type != BookType::L1Tbbo {
            return Err(ImbalanceError::InvalidConfig(format!(
                "use_quote_ticks requires book_type L1_TBBO, got {}",
                self.book_type
            )));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> ImbalanceConfig {
        ImbalanceConfig {
            trigger_min_size: self.trigger_min_size,
            trigger_imbalance_ratio: self.trigger_imbalance_ratio,
            max_trade_size: self.max_trade_size,
            use_quote_ticks: self.use_quote_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Initialized,
    Running,
    Stopped,
}

/// Sends FOK limit orders when the top of book is imbalanced
///
/// Wires an [`ImbalanceSignalEngine`] into a [`StrategyHost`]. Cancels all
/// orders and closes all positions on stop.
pub struct OrderBookImbalance<H: StrategyHost> {
    config: OrderBookImbalanceConfig,
    engine: ImbalanceSignalEngine,
    host: H,
    instrument: Option<Instrument>,
    book: Option<OrderBook>,
    metrics: StrategyMetrics,
    state: StrategyState,
    order_count: u64,
}

impl<H: StrategyHost> OrderBookImbalance<H> {
    pub fn new(config: OrderBookImbalanceConfig, host: H) -> Result<Self, StrategyError> {
        config.validate()?;
        let engine = ImbalanceSignalEngine::new(config.engine_config())?;
        let metrics = StrategyMetrics::new(&config.strategy_id).map_err(anyhow::Error::from)?;

        Ok(Self {
            config,
            engine,
            host,
            instrument: None,
            book: None,
            metrics,
            state: StrategyState::Initialized,
            order_count: 0,
        })
    }

    pub fn config(&self) -> &OrderBookImbalanceConfig {
        &self.config
    }

    pub fn engine(&self) -> &ImbalanceSignalEngine {
        &self.engine
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn book(&self) -> Option<&OrderBook> {
        self.book.as_ref()
    }

    pub fn metrics(&self) -> &StrategyMetrics {
        &self.metrics
    }

    /// Load the instrument, subscribe to market data and create the local book
    pub fn on_start(&mut self) -> Result<(), StrategyError> {
        let instrument_id = self.config.instrument_id.clone();
        let Some(instrument) = self.host.instrument(&instrument_id) else {
            error!("Could not find instrument for {}", instrument_id);
            self.state = StrategyState::Stopped;
            return Err(StrategyError::InstrumentNotFound(instrument_id));
        };

        let book_type = if self.config.use_quote_ticks {
            self.host.subscribe_quote_ticks(&instrument.id)?;
            BookType::L1Tbbo
        } else {
            self.host
                .subscribe_order_book_deltas(&instrument.id, self.config.book_type)?;
            self.config.book_type
        };
        if self.config.subscribe_ticker {
            self.host.subscribe_ticker(&instrument.id)?;
        }

        self.book = Some(OrderBook::with_book_type(&instrument.id, book_type));
        self.engine.reset();
        info!(
            "Started {} on {} ({} book, trigger_min_size={}, trigger_imbalance_ratio={})",
            self.config.strategy_id,
            instrument.id,
            book_type,
            self.config.trigger_min_size,
            self.config.trigger_imbalance_ratio
        );
        self.instrument = Some(instrument);
        self.state = StrategyState::Running;
        Ok(())
    }

    /// Dispatch a feed event to the matching handler
    pub fn on_event(&mut self, event: &MarketEvent) -> Result<Decision, StrategyError> {
        match event {
            MarketEvent::Quote(tick) => self.on_quote_tick(tick),
            MarketEvent::Delta(delta) => self.on_order_book_delta(delta),
        }
    }

    pub fn on_quote_tick(&mut self, tick: &QuoteTick) -> Result<Decision, StrategyError> {
        if !self.accepts(&tick.instrument_id) {
            return Ok(Decision::NoAction);
        }
        self.metrics.record_event("quote");

        if !self.engine.uses_quote_ticks() {
            warn!("Quote tick received while maintaining a delta book, ignoring");
            return Ok(Decision::NoAction);
        }
        if let Some(book) = &self.book {
            book.apply_quote(tick)?;
        }

        self.engine.apply_quote(
            tick.bid_price,
            tick.ask_price,
            tick.bid_size,
            tick.ask_size,
        );
        self.trigger_on_spread()
    }

    pub fn on_order_book_delta(&mut self, delta: &OrderBookDelta) -> Result<Decision, StrategyError> {
        if !self.accepts(&delta.instrument_id) {
            return Ok(Decision::NoAction);
        }
        self.metrics.record_event("delta");

        if self.engine.uses_quote_ticks() {
            warn!("Book delta received while feeding on quote ticks, ignoring");
            return Ok(Decision::NoAction);
        }
        let Some(book) = &self.book else {
            error!("No book being maintained.");
            return Ok(Decision::NoAction);
        };

        if let Err(e) = self.engine.on_book_delta(book, delta) {
            warn!("Rejected book delta (seq {}): {}", delta.sequence, e);
            self.metrics.record_invalid_delta();
            return Err(e.into());
        }
        self.trigger_on_spread()
    }

    /// Full book snapshot: replaces the local book
    pub fn on_order_book(&mut self, book: OrderBook) -> Result<Decision, StrategyError> {
        if !self.accepts(book.symbol()) {
            return Ok(Decision::NoAction);
        }
        self.metrics.record_event("snapshot");

        self.engine.refresh_from_book(&book);
        self.book = Some(book);
        self.trigger_on_spread()
    }

    /// Evaluate the current top of book and trade on an imbalance
    pub fn check_trigger(&mut self) -> Result<Decision, StrategyError> {
        if self.state != StrategyState::Running {
            return Err(StrategyError::NotRunning);
        }
        let decision = self.engine.evaluate();
        self.act(decision)
    }

    /// Drop the local book after a rejected delta, until fresh data arrives
    pub fn reset_book(&mut self) {
        if let Some(book) = &self.book {
            book.clear();
        }
        self.engine.reset();
        info!("Book reset for {}", self.config.instrument_id);
    }

    /// Cancel all orders and close all positions
    pub fn on_stop(&mut self) -> Result<(), StrategyError> {
        self.state = StrategyState::Stopped;
        let Some(instrument) = &self.instrument else {
            return Ok(());
        };

        self.host.cancel_all_orders(&instrument.id)?;
        self.host.close_all_positions(&instrument.id)?;
        info!(
            "Stopped {} after {} orders",
            self.config.strategy_id, self.order_count
        );
        Ok(())
    }

    /// Evaluate only while the book has a non-zero spread
    fn trigger_on_spread(&mut self) -> Result<Decision, StrategyError> {
        let spread = self.book.as_ref().and_then(|book| book.spread());
        match spread {
            Some(spread) if !spread.is_zero() => self.check_trigger(),
            _ => {
                debug!("No spread on {}, skipping evaluation", self.config.instrument_id);
                self.metrics.record_decision(&Decision::NoAction);
                Ok(Decision::NoAction)
            }
        }
    }

    fn accepts(&self, instrument_id: &str) -> bool {
        if self.state != StrategyState::Running {
            debug!("Strategy not running, dropping event for {}", instrument_id);
            return false;
        }
        instrument_id == self.config.instrument_id
    }

    /// Gate a decision on the host's in-flight orders and submit it
    fn act(&mut self, decision: Decision) -> Result<Decision, StrategyError> {
        let top = self.engine.top();
        if let Some(ratio) = self.engine.imbalance_ratio() {
            debug!(
                "Book: {:?} @ {:?} (ratio={:.4})",
                top.best_bid_price, top.best_ask_price, ratio
            );
            self.metrics.set_ratio(ratio);
        }

        let (side, price, quantity) = match decision {
            Decision::NoAction => {
                self.metrics.record_decision(&decision);
                return Ok(decision);
            }
            Decision::Buy { price, quantity } => (Side::Buy, price, quantity),
            Decision::Sell { price, quantity } => (Side::Sell, price, quantity),
        };

        if self.host.orders_inflight(&self.config.strategy_id) > 0 {
            debug!("Orders in flight, skipping {:?} signal", side);
            self.metrics.record_decision(&Decision::NoAction);
            return Ok(Decision::NoAction);
        }

        let Some(instrument) = &self.instrument else {
            error!("No instrument loaded.");
            return Ok(Decision::NoAction);
        };

        let quantity = instrument.make_qty(quantity);
        if quantity.is_zero() {
            debug!("Order quantity rounds to zero, skipping");
            self.metrics.record_decision(&Decision::NoAction);
            return Ok(Decision::NoAction);
        }

        self.order_count += 1;
        let order = LimitOrder {
            client_order_id: format!("{}-{}", self.config.strategy_id, self.order_count),
            strategy_id: self.config.strategy_id.clone(),
            instrument_id: instrument.id.clone(),
            side,
            price: instrument.make_price(price),
            quantity,
            time_in_force: TimeInForce::Fok,
            post_only: false,
        };
        let submitted = match side {
            Side::Buy => Decision::Buy { price: order.price, quantity: order.quantity },
            Side::Sell => Decision::Sell { price: order.price, quantity: order.quantity },
        };

        info!(
            "Imbalance {:?} {} @ {} ({})",
            order.side, order.quantity, order.price, order.client_order_id
        );
        if let Err(e) = self.host.submit_order(order) {
            error!("Failed to submit order: {}", e);
            return Err(e.into());
        }

        self.metrics.record_decision(&submitted);
        self.metrics.record_order();
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BookAction;
    use crate::host::{PaperHost, Subscription};
    use rust_decimal_macros::dec;

    const INSTRUMENT: &str = "BTCUSDT.OKX";

    fn host() -> PaperHost {
        PaperHost::new().with_instrument(Instrument::new(INSTRUMENT, 1, 3))
    }

    fn quote(bid_size: Decimal, ask_size: Decimal) -> QuoteTick {
        QuoteTick {
            instrument_id: INSTRUMENT.into(),
            bid_price: dec!(100),
            ask_price: dec!(101),
            bid_size,
            ask_size,
            ts_event: 0,
        }
    }

    fn quote_strategy() -> OrderBookImbalance<PaperHost> {
        let config = OrderBookImbalanceConfig::new(INSTRUMENT, dec!(5)).quote_ticks();
        let mut strategy = OrderBookImbalance::new(config, host()).unwrap();
        strategy.on_start().unwrap();
        strategy
    }

    fn delta_strategy() -> OrderBookImbalance<PaperHost> {
        let config = OrderBookImbalanceConfig::new(INSTRUMENT, dec!(5));
        let mut strategy = OrderBookImbalance::new(config, host()).unwrap();
        strategy.on_start().unwrap();
        strategy
    }

    #[test]
    fn test_quote_mode_subscriptions() {
        let config = OrderBookImbalanceConfig {
            subscribe_ticker: true,
            ..OrderBookImbalanceConfig::new(INSTRUMENT, dec!(5)).quote_ticks()
        };
        let mut strategy = OrderBookImbalance::new(config, host()).unwrap();
        strategy.on_start().unwrap();

        assert_eq!(strategy.state(), StrategyState::Running);
        assert_eq!(
            strategy.host().subscriptions(),
            &[
                Subscription::QuoteTicks(INSTRUMENT.into()),
                Subscription::Ticker(INSTRUMENT.into()),
            ]
        );
        assert_eq!(strategy.book().unwrap().book_type(), BookType::L1Tbbo);
    }

    #[test]
    fn test_delta_mode_subscriptions() {
        let strategy = delta_strategy();
        assert_eq!(
            strategy.host().subscriptions(),
            &[Subscription::OrderBookDeltas(INSTRUMENT.into(), BookType::L2Mbp)]
        );
    }

    #[test]
    fn test_missing_instrument_stops() {
        let config = OrderBookImbalanceConfig::new("ETHUSDT.OKX", dec!(5));
        let mut strategy = OrderBookImbalance::new(config, host()).unwrap();

        let result = strategy.on_start();
        assert!(matches!(result, Err(StrategyError::InstrumentNotFound(_))));
        assert_eq!(strategy.state(), StrategyState::Stopped);
        assert!(strategy.host().subscriptions().is_empty());

        // Nothing to cancel or close
        strategy.on_stop().unwrap();
        assert!(strategy.host().cancel_requests().is_empty());
    }

    #[test]
    fn test_quote_mode_requires_l1_book() {
        let mut config = OrderBookImbalanceConfig::new(INSTRUMENT, dec!(5));
        config.use_quote_ticks = true;
        let result = OrderBookImbalance::new(config, host());
        assert!(matches!(result, Err(StrategyError::Engine(ImbalanceError::InvalidConfig(_)))));
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let mut config = OrderBookImbalanceConfig::new(INSTRUMENT, dec!(5));
        config.trigger_imbalance_ratio = 1.0;
        assert!(OrderBookImbalance::new(config, host()).is_err());
    }

    #[test]
    fn test_imbalanced_quote_submits_fok_buy() {
        let mut strategy = quote_strategy();
        let decision = strategy.on_quote_tick(&quote(dec!(10), dec!(1))).unwrap();
        assert_eq!(decision, Decision::Buy { price: dec!(101), quantity: dec!(1) });

        let orders = strategy.host().orders();
        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, dec!(101));
        assert_eq!(order.quantity, dec!(1));
        assert_eq!(order.time_in_force, TimeInForce::Fok);
        assert!(!order.post_only);
        assert_eq!(order.client_order_id, "OBI-001-1");
        assert_eq!(strategy.metrics().orders_submitted(), 1);
    }

    #[test]
    fn test_imbalanced_quote_submits_capped_sell() {
        let mut strategy = quote_strategy();
        let decision = strategy.on_quote_tick(&quote(dec!(8), dec!(40))).unwrap();
        assert_eq!(decision, Decision::Sell { price: dec!(100), quantity: dec!(5) });
        assert_eq!(strategy.host().orders()[0].side, Side::Sell);
    }

    #[test]
    fn test_balanced_quote_submits_nothing() {
        let mut strategy = quote_strategy();
        let decision = strategy.on_quote_tick(&quote(dec!(5), dec!(5))).unwrap();
        assert_eq!(decision, Decision::NoAction);
        assert!(strategy.host().orders().is_empty());
        assert_eq!(strategy.metrics().decisions_total("no_action"), 1);
    }

    #[test]
    fn test_locked_quote_submits_nothing() {
        let mut strategy = quote_strategy();
        let mut tick = quote(dec!(10), dec!(1));
        tick.ask_price = dec!(100);

        assert_eq!(strategy.on_quote_tick(&tick).unwrap(), Decision::NoAction);
        assert!(strategy.host().orders().is_empty());
        assert_eq!(strategy.metrics().decisions_total("no_action"), 1);

        // Spread reopens on the next tick
        let decision = strategy.on_quote_tick(&quote(dec!(10), dec!(1))).unwrap();
        assert_eq!(decision, Decision::Buy { price: dec!(101), quantity: dec!(1) });
    }

    #[test]
    fn test_locked_delta_book_submits_nothing() {
        let mut strategy = delta_strategy();
        let events = [
            OrderBookDelta::new(INSTRUMENT, BookAction::Add, Side::Buy, dec!(100), dec!(2)),
            OrderBookDelta::new(INSTRUMENT, BookAction::Add, Side::Sell, dec!(100), dec!(20)),
        ];
        for delta in &events {
            assert_eq!(strategy.on_order_book_delta(delta).unwrap(), Decision::NoAction);
        }
        assert!(strategy.host().orders().is_empty());
    }

    #[test]
    fn test_locked_snapshot_submits_nothing() {
        let mut strategy = delta_strategy();
        let snapshot = OrderBook::new(INSTRUMENT);
        snapshot.update_level(Side::Buy, dec!(100), dec!(30)).unwrap();
        snapshot.update_level(Side::Sell, dec!(100), dec!(3)).unwrap();

        assert_eq!(strategy.on_order_book(snapshot).unwrap(), Decision::NoAction);
        assert!(strategy.host().orders().is_empty());
    }

    #[test]
    fn test_inflight_orders_block_submission() {
        let mut strategy = quote_strategy();
        strategy.host_mut().set_inflight("OBI-001", 1);

        let decision = strategy.on_quote_tick(&quote(dec!(10), dec!(1))).unwrap();
        assert_eq!(decision, Decision::NoAction);
        assert!(strategy.host().orders().is_empty());

        strategy.host_mut().set_inflight("OBI-001", 0);
        assert!(strategy.check_trigger().unwrap().is_trade());
        assert_eq!(strategy.host().orders().len(), 1);
    }

    #[test]
    fn test_other_instrument_ignored() {
        let mut strategy = quote_strategy();
        let mut tick = quote(dec!(10), dec!(1));
        tick.instrument_id = "ETHUSDT.OKX".into();

        assert_eq!(strategy.on_quote_tick(&tick).unwrap(), Decision::NoAction);
        assert_eq!(strategy.metrics().events_total("quote"), 0);
    }

    #[test]
    fn test_events_before_start_ignored() {
        let config = OrderBookImbalanceConfig::new(INSTRUMENT, dec!(5)).quote_ticks();
        let mut strategy = OrderBookImbalance::new(config, host()).unwrap();

        assert_eq!(strategy.on_quote_tick(&quote(dec!(10), dec!(1))).unwrap(), Decision::NoAction);
        assert!(matches!(strategy.check_trigger(), Err(StrategyError::NotRunning)));
    }

    #[test]
    fn test_quote_ignored_in_delta_mode() {
        let mut strategy = delta_strategy();
        assert_eq!(strategy.on_quote_tick(&quote(dec!(10), dec!(1))).unwrap(), Decision::NoAction);
        assert!(strategy.book().unwrap().is_empty());
    }

    #[test]
    fn test_deltas_trigger_orders() {
        let mut strategy = delta_strategy();
        let events = [
            OrderBookDelta::new(INSTRUMENT, BookAction::Add, Side::Buy, dec!(100), dec!(2)),
            OrderBookDelta::new(INSTRUMENT, BookAction::Add, Side::Sell, dec!(101), dec!(20)),
        ];
        let decisions: Vec<Decision> = events
            .iter()
            .map(|delta| strategy.on_order_book_delta(delta).unwrap())
            .collect();

        assert_eq!(decisions[0], Decision::NoAction);
        assert_eq!(decisions[1], Decision::Sell { price: dec!(100), quantity: dec!(2) });
        assert_eq!(strategy.metrics().events_total("delta"), 2);
    }

    #[test]
    fn test_invalid_delta_then_reset() {
        let mut strategy = delta_strategy();
        strategy
            .on_order_book_delta(&OrderBookDelta::new(
                INSTRUMENT,
                BookAction::Add,
                Side::Buy,
                dec!(100),
                dec!(2),
            ))
            .unwrap();

        let bad = OrderBookDelta::new(INSTRUMENT, BookAction::Delete, Side::Sell, dec!(101), Decimal::ZERO);
        let result = strategy.on_order_book_delta(&bad);
        assert!(matches!(
            result,
            Err(StrategyError::Engine(ImbalanceError::InvalidDelta { .. }))
        ));
        assert_eq!(strategy.metrics().invalid_deltas(), 1);

        strategy.reset_book();
        assert!(strategy.book().unwrap().is_empty());
        assert!(!strategy.engine().top().is_ready());
    }

    #[test]
    fn test_snapshot_replaces_book() {
        let mut strategy = delta_strategy();
        let snapshot = OrderBook::new(INSTRUMENT);
        snapshot.update_level(Side::Buy, dec!(100), dec!(30)).unwrap();
        snapshot.update_level(Side::Sell, dec!(101), dec!(3)).unwrap();

        let decision = strategy.on_order_book(snapshot).unwrap();
        assert_eq!(decision, Decision::Buy { price: dec!(101), quantity: dec!(3) });
        assert_eq!(strategy.book().unwrap().get_book_depth_count(), (1, 1));
    }

    #[test]
    fn test_quantity_truncated_to_lot_precision() {
        let mut strategy = quote_strategy();
        let decision = strategy.on_quote_tick(&quote(dec!(10), dec!(1.23456))).unwrap();
        assert_eq!(decision, Decision::Buy { price: dec!(101), quantity: dec!(1.234) });
    }

    #[test]
    fn test_rejected_submission_is_reported() {
        let mut strategy = quote_strategy();
        strategy.host_mut().set_reject_orders(true);

        let result = strategy.on_quote_tick(&quote(dec!(10), dec!(1)));
        assert!(matches!(result, Err(StrategyError::Host(_))));
        assert_eq!(strategy.metrics().orders_submitted(), 0);
    }

    #[test]
    fn test_stop_cancels_and_closes() {
        let mut strategy = quote_strategy();
        strategy.on_stop().unwrap();

        assert_eq!(strategy.state(), StrategyState::Stopped);
        assert_eq!(strategy.host().cancel_requests(), &[INSTRUMENT.to_string()]);
        assert_eq!(strategy.host().close_requests(), &[INSTRUMENT.to_string()]);

        // Events after stop are dropped
        assert_eq!(strategy.on_quote_tick(&quote(dec!(10), dec!(1))).unwrap(), Decision::NoAction);
        assert!(strategy.host().orders().is_empty());
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: OrderBookImbalanceConfig = toml::from_str(
            r#"
            instrument_id = "BTCUSDT.OKX"
            max_trade_size = "2.5"
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy_id, "OBI-001");
        assert_eq!(config.max_trade_size, dec!(2.5));
        assert_eq!(config.trigger_min_size, 0.5);
        assert_eq!(config.trigger_imbalance_ratio, 0.4);
        assert_eq!(config.book_type, BookType::L2Mbp);
        assert!(!config.use_quote_ticks);
    }
}
