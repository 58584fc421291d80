use crate::data::{OrderBook, OrderBookDelta};
use crate::error::ImbalanceError;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Engine thresholds, fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceConfig {
    /// Minimum size on the larger side required to act
    pub trigger_min_size: f64,
    /// Maximum smaller/larger size ratio that still triggers, strictly inside (0, 1)
    pub trigger_imbalance_ratio: f64,
    /// Cap on any order quantity
    pub max_trade_size: Decimal,
    /// Fed by quote ticks (true) or order book deltas (false)
    pub use_quote_ticks: bool,
}

/// Best bid / best ask price and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookTop {
    pub best_bid_price: Option<Decimal>,
    pub best_ask_price: Option<Decimal>,
    pub best_bid_qty: Option<Decimal>,
    pub best_ask_qty: Option<Decimal>,
}

impl BookTop {
    /// Both sides present with a positive price and size
    pub fn is_ready(&self) -> bool {
        self.sides().is_some()
    }

    /// (bid_price, ask_price, bid_qty, ask_qty) when the book is ready
    fn sides(&self) -> Option<(Decimal, Decimal, Decimal, Decimal)> {
        let bid_price = self.best_bid_price?;
        let ask_price = self.best_ask_price?;
        let bid_qty = self.best_bid_qty?;
        let ask_qty = self.best_ask_qty?;

        if bid_price <= Decimal::ZERO || ask_price <= Decimal::ZERO {
            return None;
        }
        if bid_qty <= Decimal::ZERO || ask_qty <= Decimal::ZERO {
            return None;
        }
        Some((bid_price, ask_price, bid_qty, ask_qty))
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoAction,
    Buy { price: Decimal, quantity: Decimal },
    Sell { price: Decimal, quantity: Decimal },
}

impl Decision {
    pub fn is_trade(&self) -> bool {
        !matches!(self, Decision::NoAction)
    }

    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Decision::NoAction => "no_action",
            Decision::Buy { .. } => "buy",
            Decision::Sell { .. } => "sell",
        }
    }
}

type InflightCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// Top-of-book size imbalance detector
///
/// Holds only the best bid/ask, and turns it into a [`Decision`]:
/// 1. Not ready (a side missing or empty) => no action
/// 2. ratio = smaller size / larger size
/// 3. Larger side must exceed `trigger_min_size`
/// 4. Ratio must be strictly below `trigger_imbalance_ratio`
/// 5. Deeper bids => buy the best ask; otherwise sell the best bid,
///    capped at `max_trade_size`
///
/// Equal sizes give a ratio of 1 and never trade. Evaluation performs no I/O.
pub struct ImbalanceSignalEngine {
    trigger_min_size: Decimal,
    trigger_imbalance_ratio: Decimal,
    max_trade_size: Decimal,
    use_quote_ticks: bool,
    top: BookTop,
    inflight: Option<InflightCheck>,
}

impl std::fmt::Debug for ImbalanceSignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImbalanceSignalEngine")
            .field("trigger_min_size", &self.trigger_min_size)
            .field("trigger_imbalance_ratio", &self.trigger_imbalance_ratio)
            .field("max_trade_size", &self.max_trade_size)
            .field("use_quote_ticks", &self.use_quote_ticks)
            .field("top", &self.top)
            .field("inflight", &self.inflight.is_some())
            .finish()
    }
}

impl ImbalanceSignalEngine {
    pub fn new(config: ImbalanceConfig) -> Result<Self, ImbalanceError> {
        let ratio = config.trigger_imbalance_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
            return Err(ImbalanceError::InvalidConfig(format!(
                "trigger_imbalance_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        if !config.trigger_min_size.is_finite() || config.trigger_min_size <= 0.0 {
            return Err(ImbalanceError::InvalidConfig(format!(
                "trigger_min_size must be positive, got {}",
                config.trigger_min_size
            )));
        }
        if config.max_trade_size <= Decimal::ZERO {
            return Err(ImbalanceError::InvalidConfig(format!(
                "max_trade_size must be positive, got {}",
                config.max_trade_size
            )));
        }

        // from_f64 keeps the shortest representation, so 0.4 compares as exactly 0.4
        let trigger_imbalance_ratio = Decimal::from_f64(ratio).ok_or_else(|| {
            ImbalanceError::InvalidConfig(format!("trigger_imbalance_ratio {} not representable", ratio))
        })?;
        let trigger_min_size = Decimal::from_f64(config.trigger_min_size).ok_or_else(|| {
            ImbalanceError::InvalidConfig(format!(
                "trigger_min_size {} not representable",
                config.trigger_min_size
            ))
        })?;

        Ok(Self {
            trigger_min_size,
            trigger_imbalance_ratio,
            max_trade_size: config.max_trade_size,
            use_quote_ticks: config.use_quote_ticks,
            top: BookTop::default(),
            inflight: None,
        })
    }

    /// Gate every `evaluate()` on an "orders in flight" predicate
    pub fn with_inflight_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.inflight = Some(Box::new(check));
        self
    }

    pub fn uses_quote_ticks(&self) -> bool {
        self.use_quote_ticks
    }

    pub fn top(&self) -> &BookTop {
        &self.top
    }

    /// Forget the current top of book
    pub fn reset(&mut self) {
        self.top = BookTop::default();
    }

    /// Replace the whole top of book from a quote, without evaluating.
    /// Returns false (state untouched) when the engine is fed by deltas.
    pub fn apply_quote(
        &mut self,
        bid_price: Decimal,
        ask_price: Decimal,
        bid_qty: Decimal,
        ask_qty: Decimal,
    ) -> bool {
        if !self.use_quote_ticks {
            return false;
        }
        self.top = BookTop {
            best_bid_price: Some(bid_price),
            best_ask_price: Some(ask_price),
            best_bid_qty: Some(bid_qty),
            best_ask_qty: Some(ask_qty),
        };
        true
    }

    /// Re-read the best levels from a maintained book
    pub fn refresh_from_book(&mut self, book: &OrderBook) {
        let (bid, ask) = book.get_top_of_book();
        self.top = BookTop {
            best_bid_price: bid.map(|level| level.price),
            best_ask_price: ask.map(|level| level.price),
            best_bid_qty: bid.map(|level| level.quantity),
            best_ask_qty: ask.map(|level| level.quantity),
        };
    }

    /// Quote update: replace the top of book, then evaluate
    pub fn on_quote(
        &mut self,
        bid_price: Decimal,
        ask_price: Decimal,
        bid_qty: Decimal,
        ask_qty: Decimal,
    ) -> Decision {
        if !self.apply_quote(bid_price, ask_price, bid_qty, ask_qty) {
            return Decision::NoAction;
        }
        self.evaluate()
    }

    /// Book delta: apply it to the caller's book, refresh the top, then evaluate
    pub fn on_book_delta(
        &mut self,
        book: &OrderBook,
        delta: &OrderBookDelta,
    ) -> Result<Decision, ImbalanceError> {
        if self.use_quote_ticks {
            return Err(ImbalanceError::invalid_delta(
                delta.side,
                delta.price,
                "engine is fed by quote ticks",
            ));
        }
        book.apply_delta(delta)?;
        self.refresh_from_book(book);
        Ok(self.evaluate())
    }

    /// smaller / larger top-of-book size, when the book is ready
    pub fn imbalance_ratio(&self) -> Option<Decimal> {
        let (_, _, bid_qty, ask_qty) = self.top.sides()?;
        let smaller = bid_qty.min(ask_qty);
        let larger = bid_qty.max(ask_qty);
        Some(smaller / larger)
    }

    /// Evaluate the current top of book, gated by the stored in-flight check
    pub fn evaluate(&self) -> Decision {
        match &self.inflight {
            Some(check) => self.evaluate_with(|| check()),
            None => self.evaluate_with(|| false),
        }
    }

    /// Evaluate the current top of book, gated by `orders_inflight`
    pub fn evaluate_with<F>(&self, orders_inflight: F) -> Decision
    where
        F: FnOnce() -> bool,
    {
        let Some((bid_price, ask_price, bid_qty, ask_qty)) = self.top.sides() else {
            return Decision::NoAction;
        };

        let smaller = bid_qty.min(ask_qty);
        let larger = bid_qty.max(ask_qty);
        let ratio = smaller / larger;

        if larger <= self.trigger_min_size {
            return Decision::NoAction;
        }
        if ratio >= self.trigger_imbalance_ratio {
            return Decision::NoAction;
        }

        // A prior order is still unresolved
        if orders_inflight() {
            return Decision::NoAction;
        }

        if bid_qty > ask_qty {
            Decision::Buy {
                price: ask_price,
                quantity: ask_qty.min(self.max_trade_size),
            }
        } else {
            Decision::Sell {
                price: bid_price,
                quantity: bid_qty.min(self.max_trade_size),
            }
        }
    }
}
