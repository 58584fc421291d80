pub mod imbalance;

pub use imbalance::{BookTop, Decision, ImbalanceConfig, ImbalanceSignalEngine};
