//! A process-wide metrics registry.
//!
//! Every counter or gauge the orchestrator exposes (per-ingester byte/message
//! counts, scheduler job outcomes, queue depth) goes through a [`Registry`],
//! which hands out typed [`Metric`] handles keyed by name. A [`Metric`] in
//! turn hands out label-keyed recorders (one per ingester ID, one per vault
//! ID, ...) so unrelated instances of the same named metric don't stomp on
//! each other.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

use parking_lot::Mutex;
use std::{
    any::Any,
    collections::BTreeMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
};

/// A set of label key/value pairs identifying one recorder within a [`Metric`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<&[(&str, &str)]> for Attributes {
    fn from(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<_> = pairs
            .iter()
            .map(|(k, val)| (k.to_string(), val.to_string()))
            .collect();
        v.sort();
        Self(v)
    }
}

/// A value type a [`Metric`] can record. Implemented for the counter and
/// gauge types in this crate.
pub trait MetricKind: Send + Sync + Debug + Default + 'static {}

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct U64Counter(AtomicU64);

impl U64Counter {
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl MetricKind for U64Counter {}

/// A value that can move up or down.
#[derive(Debug, Default)]
pub struct I64Gauge(AtomicI64);

impl I64Gauge {
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn dec(&self, delta: i64) {
        self.0.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl MetricKind for I64Gauge {}

/// A named metric, addressed by [`Attributes`] to obtain a recorder.
#[derive(Debug)]
pub struct Metric<T: MetricKind> {
    name: &'static str,
    recorders: Arc<Mutex<BTreeMap<Attributes, Arc<T>>>>,
}

impl<T: MetricKind> Clone for Metric<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            recorders: Arc::clone(&self.recorders),
        }
    }
}

impl<T: MetricKind> Metric<T> {
    /// Returns the recorder for the given label set, creating it on first use.
    pub fn recorder(&self, attrs: impl Into<Attributes>) -> Arc<T> {
        let attrs = attrs.into();
        let mut recorders = self.recorders.lock();
        Arc::clone(recorders.entry(attrs).or_insert_with(|| Arc::new(T::default())))
    }

    /// Returns the recorder for the given label set if it has been created.
    pub fn get_observer(&self, attrs: &Attributes) -> Option<Arc<T>> {
        self.recorders.lock().get(attrs).cloned()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

trait AnyMetric: Any + Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: MetricKind> AnyMetric for Metric<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Process-wide registry of named metrics.
#[derive(Debug, Default)]
pub struct Registry {
    instruments: Mutex<BTreeMap<&'static str, Box<dyn AnyMetric>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or returns the already-registered) metric under `name`.
    /// `description` is accepted for parity with the registration call sites
    /// elsewhere in the workspace; it is not currently surfaced anywhere.
    pub fn register_metric<T: MetricKind>(
        &self,
        name: &'static str,
        _description: &'static str,
    ) -> Metric<T> {
        let mut instruments = self.instruments.lock();
        let entry = instruments.entry(name).or_insert_with(|| {
            Box::new(Metric::<T> {
                name,
                recorders: Arc::new(Mutex::new(BTreeMap::new())),
            })
        });
        entry
            .as_any()
            .downcast_ref::<Metric<T>>()
            .expect("metric re-registered under the same name with a different kind")
            .clone()
    }

    /// Looks up a previously registered metric by name.
    pub fn get_instrument<T: MetricKind>(&self, name: &'static str) -> Option<Metric<T>> {
        let instruments = self.instruments.lock();
        instruments
            .get(name)
            .map(|m| {
                m.as_any()
                    .downcast_ref::<Metric<T>>()
                    .expect("metric registered under the same name with a different kind")
                    .clone()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_recorders_are_keyed_by_attributes() {
        let registry = Registry::new();
        let metric: Metric<U64Counter> = registry.register_metric("ingest_messages", "count");

        metric.recorder(&[("ingester_id", "a")][..]).inc(3);
        metric.recorder(&[("ingester_id", "b")][..]).inc(5);

        assert_eq!(metric.recorder(&[("ingester_id", "a")][..]).fetch(), 3);
        assert_eq!(metric.recorder(&[("ingester_id", "b")][..]).fetch(), 5);
    }

    #[test]
    fn lookup_by_name_returns_same_recorders() {
        let registry = Registry::new();
        let write_side: Metric<U64Counter> = registry.register_metric("jobs_run", "count");
        write_side.recorder(&[("outcome", "completed")][..]).inc(1);

        let read_side: Metric<U64Counter> = registry.get_instrument("jobs_run").unwrap();
        assert_eq!(
            read_side.get_observer(&Attributes::from(&[("outcome", "completed")][..]))
                .unwrap()
                .fetch(),
            1
        );
    }
}
