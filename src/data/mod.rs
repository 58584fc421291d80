pub mod types;
pub mod orderbook;

pub use orderbook::OrderBook;
pub use types::{
    BookAction, BookType, Instrument, LimitOrder, MarketEvent, OrderBookDelta, PriceLevel,
    QuoteTick, Side, TimeInForce,
};
