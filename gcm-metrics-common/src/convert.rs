//! Conversion from raw remote time series into normalized metrics.
use std::collections::BTreeMap;

use compact_str::{CompactString, ToCompactString};
use enum_dispatch::enum_dispatch;
use thiserror::Error;

use crate::{
    metrics::{DataPoint, Label, Metric, MetricKind, NumberValue, Temporality, Timestamp},
    timeseries::{RawMetricKind, RawPoint, RawTimeSeries, RawValue},
};

/// Attribute key holding the monitored resource type.
pub const RESOURCE_TYPE_ATTRIBUTE: &str = "resource_type";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("unsupported metric kind {kind} for {metric}")]
    UnsupportedMetricKind { metric: Box<str>, kind: RawMetricKind },

    #[error("unsupported {encoding} value for {metric} ({kind})")]
    UnsupportedValueType {
        metric: Box<str>,
        kind: MetricKind,
        encoding: &'static str,
    },

    #[error("timestamp {seconds} of {metric} is out of range")]
    InvalidTimestamp { metric: Box<str>, seconds: i64 },
}

/// Per-kind mapping of raw points.
#[enum_dispatch]
trait KindHandler {
    fn metric_kind(&self) -> MetricKind;

    /// Extract the numeric value of a point, `None` if the encoding isn't supported.
    fn extract_value(&self, value: &RawValue) -> Option<NumberValue>;
}

struct GaugeHandler;

impl KindHandler for GaugeHandler {
    fn metric_kind(&self) -> MetricKind {
        MetricKind::Gauge
    }

    fn extract_value(&self, value: &RawValue) -> Option<NumberValue> {
        match *value {
            RawValue::Double(d) => Some(NumberValue::Double(d)),
            RawValue::Int64(i) => Some(NumberValue::Int64(i)),
            _ => None,
        }
    }
}

/// Sums are always reported as floating point values.
fn extract_sum_value(value: &RawValue) -> Option<NumberValue> {
    match *value {
        RawValue::Double(d) => Some(NumberValue::Double(d)),
        RawValue::Int64(i) => Some(NumberValue::Double(i as f64)),
        _ => None,
    }
}

struct CumulativeHandler;

impl KindHandler for CumulativeHandler {
    fn metric_kind(&self) -> MetricKind {
        MetricKind::Sum(Temporality::Cumulative)
    }

    fn extract_value(&self, value: &RawValue) -> Option<NumberValue> {
        extract_sum_value(value)
    }
}

struct DeltaHandler;

impl KindHandler for DeltaHandler {
    fn metric_kind(&self) -> MetricKind {
        MetricKind::Sum(Temporality::Delta)
    }

    fn extract_value(&self, value: &RawValue) -> Option<NumberValue> {
        extract_sum_value(value)
    }
}

#[enum_dispatch(KindHandler)]
enum KindHandlerEnum {
    GaugeHandler,
    CumulativeHandler,
    DeltaHandler,
}

fn handler_for(kind: &RawMetricKind) -> Option<KindHandlerEnum> {
    match kind {
        RawMetricKind::Gauge => Some(GaugeHandler.into()),
        RawMetricKind::Cumulative => Some(CumulativeHandler.into()),
        RawMetricKind::Delta => Some(DeltaHandler.into()),
        RawMetricKind::Unspecified | RawMetricKind::Unknown(_) => None,
    }
}

/// Result of converting a single time series.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub metric: Metric,
    /// Points that couldn't be converted.
    pub skipped: Vec<ConversionError>,
}

/// Convert one time series.
///
/// Fails only when the whole series is unusable, individual points that
/// can't be converted are reported in [Conversion::skipped].
pub fn convert_time_series(ts: RawTimeSeries) -> Result<Conversion, ConversionError> {
    let Some(handler) = handler_for(&ts.metric_kind) else {
        return Err(ConversionError::UnsupportedMetricKind {
            metric: ts.metric_type,
            kind: ts.metric_kind,
        });
    };

    let kind = handler.metric_kind();
    let resource_attributes = fold_resource_attributes(&ts);
    let labels = ts
        .metric_labels
        .into_iter()
        .map(|(name, value)| Label { name, value })
        .collect();

    let mut skipped = vec![];
    let data_points = ts
        .points
        .into_iter()
        .filter_map(|RawPoint { timestamp, value }| {
            let Some(ts_nanos) = Timestamp::from_unix_seconds(timestamp) else {
                skipped.push(ConversionError::InvalidTimestamp {
                    metric: ts.metric_type.clone(),
                    seconds: timestamp,
                });
                return None;
            };

            let Some(value) = handler.extract_value(&value) else {
                skipped.push(ConversionError::UnsupportedValueType {
                    metric: ts.metric_type.clone(),
                    kind,
                    encoding: value.encoding(),
                });
                return None;
            };

            Some(DataPoint {
                timestamp: ts_nanos,
                value,
            })
        })
        .collect();

    Ok(Conversion {
        metric: Metric {
            name: ts.metric_type,
            unit: ts.unit,
            description: ts.description,
            kind,
            labels,
            resource_attributes,
            data_points,
        },
        skipped,
    })
}

/// Merge resource type, resource labels and metadata labels into one attribute map.
///
/// Later sources override earlier ones on key collision:
/// resource labels, then user labels, then system labels.
pub fn fold_resource_attributes(ts: &RawTimeSeries) -> BTreeMap<CompactString, CompactString> {
    let mut attributes = BTreeMap::new();

    if !ts.resource_type.is_empty() {
        attributes.insert(
            CompactString::const_new(RESOURCE_TYPE_ATTRIBUTE),
            CompactString::from(ts.resource_type.as_ref()),
        );
    }

    attributes.extend(ts.resource_labels.clone());
    attributes.extend(ts.metadata_user_labels.clone());
    attributes.extend(
        ts.metadata_system_labels
            .iter()
            .map(|(name, value)| (name.clone(), render_system_label(value))),
    );

    attributes
}

fn render_system_label(value: &serde_json::Value) -> CompactString {
    match value {
        serde_json::Value::String(s) => s.to_compact_string(),
        serde_json::Value::Null => CompactString::default(),
        other => other.to_compact_string(),
    }
}

/// Counters of what a converter dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub converted_series: usize,
    /// Series dropped because of an unsupported metric kind.
    pub dropped_series: usize,
    /// Points dropped from otherwise converted series.
    pub skipped_points: usize,
}

impl ConversionStats {
    pub fn merge(&mut self, other: ConversionStats) {
        self.converted_series += other.converted_series;
        self.dropped_series += other.dropped_series;
        self.skipped_points += other.skipped_points;
    }
}

/// Stateful wrapper over [convert_time_series] that logs and counts drops.
#[derive(Debug, Default)]
pub struct MetricConverter {
    stats: ConversionStats,
}

impl MetricConverter {
    pub fn convert(&mut self, ts: RawTimeSeries) -> Option<Metric> {
        match convert_time_series(ts) {
            Ok(Conversion { metric, skipped }) => {
                for error in &skipped {
                    tracing::warn!("Skipped point: {error}");
                }

                self.stats.converted_series += 1;
                self.stats.skipped_points += skipped.len();
                Some(metric)
            }
            Err(error) => {
                tracing::warn!("Dropped series: {error}");
                self.stats.dropped_series += 1;
                None
            }
        }
    }

    pub fn stats(&self) -> ConversionStats {
        self.stats
    }
}
