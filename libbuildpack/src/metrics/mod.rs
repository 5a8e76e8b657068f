//! Builder metrics: usage counters and float datapoints reported by the buildpacks.
//!
//! The registry is owned by the [`Context`](crate::Context) and shared through an [`Arc`]. It is
//! serialized to `<layers>/builder-metrics.json` at the end of a build.

mod descriptors;

pub use descriptors::Descriptor;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies a metric. Counters and float datapoints share the id space and ids are never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricId {
    ArNpmCredsGenerated = 1,
    NpmGcpBuildScriptUses = 2,
    NpmBuildScriptUses = 3,
    NpmGoogleNodeRunScriptUses = 4,
    VendorPipDependenciesUses = 5,
    NpmNodeModulesUses = 6,
    VendorNpmDependenciesUses = 7,
    NpmInstallLatency = 8,
    ComposerInstallLatency = 9,
    PipInstallLatency = 10,
    JavaGaeWebXmlConfigUses = 11,
    JavaGaeSessionHandlerUses = 12,
    NodejsBytecodeCacheGenerated = 13,
    PipUsage = 14,
    PoetryUsage = 15,
    UvUsage = 16,
    NpmUsage = 17,
    YarnUsage = 18,
    PnpmUsage = 19,
    JavaSpringBootUsage = 20,
    BunUsage = 21,
}

impl MetricId {
    pub const ALL: [MetricId; 21] = [
        MetricId::ArNpmCredsGenerated,
        MetricId::NpmGcpBuildScriptUses,
        MetricId::NpmBuildScriptUses,
        MetricId::NpmGoogleNodeRunScriptUses,
        MetricId::VendorPipDependenciesUses,
        MetricId::NpmNodeModulesUses,
        MetricId::VendorNpmDependenciesUses,
        MetricId::NpmInstallLatency,
        MetricId::ComposerInstallLatency,
        MetricId::PipInstallLatency,
        MetricId::JavaGaeWebXmlConfigUses,
        MetricId::JavaGaeSessionHandlerUses,
        MetricId::NodejsBytecodeCacheGenerated,
        MetricId::PipUsage,
        MetricId::PoetryUsage,
        MetricId::UvUsage,
        MetricId::NpmUsage,
        MetricId::YarnUsage,
        MetricId::PnpmUsage,
        MetricId::JavaSpringBootUsage,
        MetricId::BunUsage,
    ];

    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn descriptor(self) -> Descriptor {
        descriptors::DESCRIPTORS[usize::from(self.number()) - 1]
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for MetricId {
    type Err = MetricsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .parse::<u8>()
            .ok()
            .and_then(|number| {
                MetricId::ALL
                    .into_iter()
                    .find(|id| id.number() == number)
            })
            .ok_or_else(|| MetricsError::UnknownMetricId(value.to_string()))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("Unknown metric id: {0:?}")]
    UnknownMetricId(String),

    #[error("Metrics JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self, amount: u64) {
        self.0.fetch_add(amount, Ordering::Relaxed);
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A float datapoint. Every recorded value is added to the total.
#[derive(Debug, Default)]
pub struct FloatDataPoint(Mutex<f64>);

impl FloatDataPoint {
    pub fn add(&self, value: f64) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) += value;
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The serialized form of a [`MetricsRegistry`]: `{"c": {"14": 1}, "f": {"10": 3.5}}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(rename = "c", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, u64>,
    #[serde(rename = "f", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub float_data_points: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: Mutex<BTreeMap<MetricId, Arc<Counter>>>,
    float_data_points: Mutex<BTreeMap<MetricId, Arc<FloatDataPoint>>>,
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for `id`, creating it on first use.
    pub fn counter(&self, id: MetricId) -> Arc<Counter> {
        Arc::clone(lock(&self.counters).entry(id).or_default())
    }

    /// Returns the float datapoint for `id`, creating it on first use.
    pub fn float_data_point(&self, id: MetricId) -> Arc<FloatDataPoint> {
        Arc::clone(lock(&self.float_data_points).entry(id).or_default())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.counters).is_empty() && lock(&self.float_data_points).is_empty()
    }

    /// Removes all metrics.
    pub fn reset(&self) {
        lock(&self.counters).clear();
        lock(&self.float_data_points).clear();
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: lock(&self.counters)
                .iter()
                .map(|(id, counter)| (id.to_string(), counter.value()))
                .collect(),
            float_data_points: lock(&self.float_data_points)
                .iter()
                .map(|(id, data_point)| (id.to_string(), data_point.value()))
                .collect(),
        }
    }

    /// Adds the values of a snapshot, for example one written by an earlier buildpack.
    pub fn merge(&self, snapshot: &MetricsSnapshot) -> Result<(), MetricsError> {
        for (id, value) in &snapshot.counters {
            self.counter(id.parse()?).increment(*value);
        }

        for (id, value) in &snapshot.float_data_points {
            self.float_data_point(id.parse()?).add(*value);
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String, MetricsError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, MetricsError> {
        let registry = Self::new();
        registry.merge(&serde_json::from_str(json)?)?;
        Ok(registry)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
