//! A process-local drain to accumulate proxy metrics.
//!
//! Sessions record through the [`incr!`], [`count!`] and [`gauge_add!`]
//! macros; the embedder (or a test) reads the aggregated map back with
//! [`snapshot`]. The drain is thread-local, matching the single-reactor
//! execution model: each reactor thread aggregates its own counters.

use std::cell::RefCell;
use std::collections::BTreeMap;

/// A metric as submitted at a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Count(i64),
    Gauge(usize),
    GaugeAdd(i64),
}

/// A metric as stored in the drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatedMetric {
    Count(i64),
    Gauge(usize),
}

impl AggregatedMetric {
    fn new(metric: MetricValue) -> AggregatedMetric {
        match metric {
            MetricValue::Count(value) => AggregatedMetric::Count(value),
            MetricValue::Gauge(value) => AggregatedMetric::Gauge(value),
            MetricValue::GaugeAdd(value) => AggregatedMetric::Gauge(value.max(0) as usize),
        }
    }

    fn update(&mut self, key: &str, metric: MetricValue) {
        match (self, metric) {
            (AggregatedMetric::Count(v1), MetricValue::Count(v2)) => *v1 += v2,
            (AggregatedMetric::Gauge(v1), MetricValue::Gauge(v2)) => *v1 = v2,
            (AggregatedMetric::Gauge(v1), MetricValue::GaugeAdd(v2)) => {
                *v1 = (*v1 as i64 + v2).max(0) as usize
            }
            (s, m) => panic!("tried to update metric {key} of value {s:?} with an incompatible metric: {m:?}"),
        }
    }
}

#[derive(Debug, Default)]
struct LocalDrain {
    metrics: BTreeMap<String, AggregatedMetric>,
}

impl LocalDrain {
    fn receive_metric(&mut self, key: &str, metric: MetricValue) {
        match self.metrics.get_mut(key) {
            Some(aggregated) => aggregated.update(key, metric),
            None => {
                self.metrics
                    .insert(key.to_string(), AggregatedMetric::new(metric));
            }
        }
    }
}

thread_local! {
    static DRAIN: RefCell<LocalDrain> = RefCell::new(LocalDrain::default());
}

pub fn record(key: &str, metric: MetricValue) {
    DRAIN.with(|drain| drain.borrow_mut().receive_metric(key, metric));
}

/// Copy of the aggregated metrics for this thread.
pub fn snapshot() -> BTreeMap<String, AggregatedMetric> {
    DRAIN.with(|drain| drain.borrow().metrics.clone())
}

pub fn clear() {
    DRAIN.with(|drain| drain.borrow_mut().metrics.clear());
}

#[macro_export]
macro_rules! incr {
    ($key:expr) => {
        $crate::metrics::record($key, $crate::metrics::MetricValue::Count(1))
    };
}

#[macro_export]
macro_rules! count {
    ($key:expr, $value:expr) => {
        $crate::metrics::record($key, $crate::metrics::MetricValue::Count($value as i64))
    };
}

#[macro_export]
macro_rules! gauge_add {
    ($key:expr, $value:expr) => {
        $crate::metrics::record($key, $crate::metrics::MetricValue::GaugeAdd($value as i64))
    };
}
