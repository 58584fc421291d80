use crate::data::Side;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the order book and the imbalance engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImbalanceError {
    /// Rejected at construction; the engine is never built
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A single delta could not be applied. The book is left untouched and
    /// the caller may reset it from a fresh snapshot.
    #[error("Invalid delta on {side:?} @ {price}: {reason}")]
    InvalidDelta {
        side: Side,
        price: Decimal,
        reason: String,
    },
}

impl ImbalanceError {
    pub fn invalid_delta(side: Side, price: Decimal, reason: impl Into<String>) -> Self {
        Self::InvalidDelta {
            side,
            price,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the strategy wrapper
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Could not find instrument for {0}")]
    InstrumentNotFound(String),

    #[error("Strategy is not running")]
    NotRunning,

    #[error(transparent)]
    Engine(#[from] ImbalanceError),

    #[error("Host error: {0}")]
    Host(#[from] anyhow::Error),
}
