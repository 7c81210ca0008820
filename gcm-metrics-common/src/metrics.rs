//! Normalized metrics data structures, loosely modelled after OpenTelemetry metrics.
use std::{
    collections::BTreeMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use compact_str::CompactString;

/// Metrics produced by one scrape cycle.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct MetricBatch {
    pub metrics: Vec<Metric>,
}

impl MetricBatch {
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Total count of data points across all metrics.
    pub fn data_point_count(&self) -> usize {
        self.metrics.iter().map(|m| m.data_points.len()).sum()
    }

    pub fn append(&mut self, other: &mut MetricBatch) {
        self.metrics.append(&mut other.metrics);
    }
}

impl FromIterator<Metric> for MetricBatch {
    fn from_iter<T: IntoIterator<Item = Metric>>(iter: T) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

/// A single normalized time series.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Metric {
    pub name: Box<str>,
    pub unit: Box<str>,
    pub description: Box<str>,
    pub kind: MetricKind,

    /// Labels identifying the series inside its metric type.
    pub labels: Box<[Label]>,
    /// Resource and metadata attributes, rendered as strings.
    pub resource_attributes: BTreeMap<CompactString, CompactString>,

    /// *Kept in the order the remote returned them.*
    pub data_points: Box<[DataPoint]>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum MetricKind {
    #[default]
    Gauge,
    Sum(Temporality),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Temporality {
    Cumulative,
    Delta,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MetricKind::Gauge => "Gauge",
            MetricKind::Sum(Temporality::Cumulative) => "Cumulative Sum",
            MetricKind::Sum(Temporality::Delta) => "Delta Sum",
        })
    }
}

#[derive(Clone, PartialEq, Debug, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub name: CompactString,
    pub value: CompactString,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DataPoint {
    pub timestamp: Timestamp,
    pub value: NumberValue,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum NumberValue {
    Double(f64),
    Int64(i64),
}

impl NumberValue {
    pub fn as_f64(self) -> f64 {
        match self {
            NumberValue::Double(d) => d,
            NumberValue::Int64(i) => i as f64,
        }
    }
}

/// Nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Timestamp(pub u64);

const NANOS_PER_SECOND: u64 = 1_000_000_000;

impl Timestamp {
    /// Convert whole seconds since the epoch, `None` if negative or out of range.
    ///
    /// The conversion is an exact multiplication, sources with sub-second
    /// precision need to widen it.
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        u64::try_from(seconds)
            .ok()?
            .checked_mul(NANOS_PER_SECOND)
            .map(Self)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }
}

impl From<Timestamp> for SystemTime {
    fn from(Timestamp(nanos): Timestamp) -> Self {
        UNIX_EPOCH + Duration::from_nanos(nanos)
    }
}
