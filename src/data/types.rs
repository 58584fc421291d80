use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order / book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Single price level in the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Depth of book the strategy maintains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookType {
    /// Top of book only (best bid / best offer)
    #[serde(rename = "L1_TBBO")]
    L1Tbbo,
    /// Market by price
    #[serde(rename = "L2_MBP")]
    #[default]
    L2Mbp,
    /// Market by order
    #[serde(rename = "L3_MBO")]
    L3Mbo,
}

impl FromStr for BookType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "L1_TBBO" => Ok(BookType::L1Tbbo),
            "L2_MBP" => Ok(BookType::L2Mbp),
            "L3_MBO" => Ok(BookType::L3Mbo),
            other => Err(format!("unknown book type: {}", other)),
        }
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookType::L1Tbbo => "L1_TBBO",
            BookType::L2Mbp => "L2_MBP",
            BookType::L3Mbo => "L3_MBO",
        };
        f.write_str(name)
    }
}

/// Tradable instrument with its price/size precision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub price_precision: u32,
    pub size_precision: u32,
}

impl Instrument {
    pub fn new(id: impl Into<String>, price_precision: u32, size_precision: u32) -> Self {
        Self {
            id: id.into(),
            price_precision,
            size_precision,
        }
    }

    /// Round a raw price to the instrument tick precision
    pub fn make_price(&self, price: Decimal) -> Decimal {
        price.round_dp_with_strategy(self.price_precision, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Truncate a raw quantity to the instrument lot precision.
    /// Never rounds up: the result must not exceed the resting size.
    pub fn make_qty(&self, quantity: Decimal) -> Decimal {
        quantity.round_dp_with_strategy(self.size_precision, RoundingStrategy::ToZero)
    }
}

/// Best bid / best ask update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTick {
    pub instrument_id: String,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
    #[serde(default)]
    pub ts_event: u64,
}

/// Kind of change carried by an order book delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookAction {
    Add,
    Update,
    Delete,
    Clear,
}

/// Incremental change to one price level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookDelta {
    pub instrument_id: String,
    pub action: BookAction,
    pub side: Side,
    pub price: Decimal,
    #[serde(default)]
    pub size: Decimal,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub ts_event: u64,
}

impl OrderBookDelta {
    pub fn new(
        instrument_id: impl Into<String>,
        action: BookAction,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            action,
            side,
            price,
            size,
            sequence: 0,
            ts_event: 0,
        }
    }

    pub fn clear(instrument_id: impl Into<String>) -> Self {
        Self::new(instrument_id, BookAction::Clear, Side::Buy, Decimal::ZERO, Decimal::ZERO)
    }
}

/// Market events delivered by the host feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarketEvent {
    Quote(QuoteTick),
    Delta(OrderBookDelta),
}

impl MarketEvent {
    pub fn instrument_id(&self) -> &str {
        match self {
            MarketEvent::Quote(tick) => &tick.instrument_id,
            MarketEvent::Delta(delta) => &delta.instrument_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    /// Fill or kill: execute completely and immediately, or not at all
    Fok,
}

/// Limit order handed to the host for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub client_order_id: String,
    pub strategy_id: String,
    pub instrument_id: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
}
