use crate::strategy::Decision;
use anyhow::Result;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Prometheus metrics for one strategy instance
///
/// Each instance owns its registry so several strategies (and tests) can
/// run side by side without clashing on the global default registry.
#[derive(Clone)]
pub struct StrategyMetrics {
    registry: Registry,
    events: IntCounterVec,
    decisions: IntCounterVec,
    orders_submitted: IntCounter,
    invalid_deltas: IntCounter,
    imbalance_ratio: Gauge,
}

impl StrategyMetrics {
    pub fn new(strategy_id: &str) -> prometheus::Result<Self> {
        let mut labels = HashMap::new();
        labels.insert("strategy_id".to_string(), strategy_id.to_string());
        let registry = Registry::new_custom(Some("obi".to_string()), Some(labels))?;

        let events = IntCounterVec::new(
            Opts::new("market_events_total", "Market events handled"),
            &["kind"],
        )?;
        let decisions = IntCounterVec::new(
            Opts::new("decisions_total", "Evaluated decisions by outcome"),
            &["outcome"],
        )?;
        let orders_submitted = IntCounter::new("orders_submitted_total", "FOK orders submitted")?;
        let invalid_deltas = IntCounter::new("invalid_deltas_total", "Rejected book deltas")?;
        let imbalance_ratio = Gauge::new("imbalance_ratio", "Last top-of-book size ratio")?;

        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(orders_submitted.clone()))?;
        registry.register(Box::new(invalid_deltas.clone()))?;
        registry.register(Box::new(imbalance_ratio.clone()))?;

        Ok(Self {
            registry,
            events,
            decisions,
            orders_submitted,
            invalid_deltas,
            imbalance_ratio,
        })
    }

    pub fn record_event(&self, kind: &str) {
        self.events.with_label_values(&[kind]).inc();
    }

    pub fn record_decision(&self, decision: &Decision) {
        self.decisions.with_label_values(&[decision.label()]).inc();
    }

    pub fn record_order(&self) {
        self.orders_submitted.inc();
    }

    pub fn record_invalid_delta(&self) {
        self.invalid_deltas.inc();
    }

    pub fn set_ratio(&self, ratio: Decimal) {
        if let Some(value) = ratio.to_f64() {
            self.imbalance_ratio.set(value);
        }
    }

    pub fn events_total(&self, kind: &str) -> u64 {
        self.events.with_label_values(&[kind]).get()
    }

    pub fn decisions_total(&self, outcome: &str) -> u64 {
        self.decisions.with_label_values(&[outcome]).get()
    }

    pub fn orders_submitted(&self) -> u64 {
        self.orders_submitted.get()
    }

    pub fn invalid_deltas(&self) -> u64 {
        self.invalid_deltas.get()
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
