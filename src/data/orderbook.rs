use crate::data::types::{BookAction, BookType, OrderBookDelta, PriceLevel, QuoteTick, Side};
use crate::error::ImbalanceError;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Order book keyed by side and price
///
/// Levels live in a `DashMap` per side so a shared reference can be read
/// from another thread while the owning strategy applies updates.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    book_type: BookType,
    bids: DashMap<Decimal, Decimal>,
    asks: DashMap<Decimal, Decimal>,
    last_sequence: AtomicU64,
}

impl OrderBook {
    pub fn new(symbol: &str) -> Self {
        Self::with_book_type(symbol, BookType::L2Mbp)
    }

    pub fn with_book_type(symbol: &str, book_type: BookType) -> Self {
        Self {
            symbol: symbol.to_string(),
            book_type,
            bids: DashMap::new(),
            asks: DashMap::new(),
            last_sequence: AtomicU64::new(0),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn book_type(&self) -> BookType {
        self.book_type
    }

    fn levels(&self, side: Side) -> &DashMap<Decimal, Decimal> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Set the resting size at a price level. A zero quantity removes the level.
    pub fn update_level(
        &self,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<(), ImbalanceError> {
        check_level(side, price, quantity)?;

        let levels = self.levels(side);
        if quantity.is_zero() {
            levels.remove(&price);
        } else {
            levels.insert(price, quantity);
        }
        Ok(())
    }

    /// Apply one incremental delta
    ///
    /// Deleting a level that is not in the book fails and leaves the book unchanged.
    pub fn apply_delta(&self, delta: &OrderBookDelta) -> Result<(), ImbalanceError> {
        match delta.action {
            BookAction::Clear => self.clear(),
            BookAction::Add | BookAction::Update => {
                check_level(delta.side, delta.price, delta.size)?;
                if self.book_type == BookType::L1Tbbo && !delta.size.is_zero() {
                    // Top-of-book only: the new level replaces the side
                    self.levels(delta.side).clear();
                }
                self.update_level(delta.side, delta.price, delta.size)?;
            }
            BookAction::Delete => {
                if self.levels(delta.side).remove(&delta.price).is_none() {
                    return Err(ImbalanceError::invalid_delta(
                        delta.side,
                        delta.price,
                        "delete of missing level",
                    ));
                }
            }
        }

        self.last_sequence.store(delta.sequence, Ordering::Relaxed);
        Ok(())
    }

    /// Replace the book with the two sides of a quote tick
    ///
    /// A tick with an invalid side is rejected and the book is left as it was.
    pub fn apply_quote(&self, tick: &QuoteTick) -> Result<(), ImbalanceError> {
        check_level(Side::Buy, tick.bid_price, tick.bid_size)?;
        check_level(Side::Sell, tick.ask_price, tick.ask_size)?;
        self.clear();
        self.update_level(Side::Buy, tick.bid_price, tick.bid_size)?;
        self.update_level(Side::Sell, tick.ask_price, tick.ask_size)
    }

    pub fn clear(&self) {
        self.bids.clear();
        self.asks.clear();
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .max_by_key(|entry| *entry.key())
            .map(|entry| PriceLevel::new(*entry.key(), *entry.value()))
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .min_by_key(|entry| *entry.key())
            .map(|entry| PriceLevel::new(*entry.key(), *entry.value()))
    }

    /// Best bid and best ask
    pub fn get_top_of_book(&self) -> (Option<PriceLevel>, Option<PriceLevel>) {
        (self.best_bid(), self.best_ask())
    }

    /// Ask minus bid. `None` unless both sides are populated.
    pub fn spread(&self) -> Option<Decimal> {
        match self.get_top_of_book() {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn get_mid_price(&self) -> Option<Decimal> {
        match self.get_top_of_book() {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn get_spread_bps(&self) -> Option<Decimal> {
        let spread = self.spread()?;
        let mid = self.get_mid_price()?;
        if mid.is_zero() {
            return None;
        }
        Some(spread / mid * Decimal::from(10_000))
    }

    /// Top `levels` of each side, best price first
    pub fn get_depth(&self, levels: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let mut bids: Vec<PriceLevel> = self
            .bids
            .iter()
            .map(|entry| PriceLevel::new(*entry.key(), *entry.value()))
            .collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        bids.truncate(levels);

        let mut asks: Vec<PriceLevel> = self
            .asks
            .iter()
            .map(|entry| PriceLevel::new(*entry.key(), *entry.value()))
            .collect();
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        asks.truncate(levels);

        (bids, asks)
    }

    /// Number of (bid, ask) levels
    pub fn get_book_depth_count(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Relaxed)
    }
}

fn check_level(side: Side, price: Decimal, quantity: Decimal) -> Result<(), ImbalanceError> {
    if price.is_sign_negative() {
        return Err(ImbalanceError::invalid_delta(side, price, "negative price"));
    }
    if quantity.is_sign_negative() {
        return Err(ImbalanceError::invalid_delta(side, price, "negative size"));
    }
    Ok(())
}
