//! Time series as returned by the Cloud Monitoring `timeSeries.list` API.
//!
//! The JSON representation follows the proto3 JSON mapping: 64-bit integers
//! are transmitted as strings, non-finite doubles as `"NaN"`/`"Infinity"`,
//! and timestamps as RFC 3339 strings.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{de, Deserialize, Deserializer};

/// One time series as received from the remote, before normalization.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct RawTimeSeries {
    pub metric_type: Box<str>,
    pub metric_labels: BTreeMap<CompactString, CompactString>,
    pub unit: Box<str>,
    pub description: Box<str>,
    pub metric_kind: RawMetricKind,
    pub value_type: ValueType,

    pub resource_type: Box<str>,
    pub resource_labels: BTreeMap<CompactString, CompactString>,

    pub metadata_user_labels: BTreeMap<CompactString, CompactString>,
    /// Structured values, may be strings, numbers, booleans or lists.
    pub metadata_system_labels: BTreeMap<CompactString, serde_json::Value>,

    pub points: Vec<RawPoint>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct RawPoint {
    /// End of the point interval, in whole seconds since the Unix epoch.
    pub timestamp: i64,
    pub value: RawValue,
}

#[derive(Clone, PartialEq, Debug)]
pub enum RawValue {
    Double(f64),
    Int64(i64),
    Bool(bool),
    String(Box<str>),
    Distribution(serde_json::Value),
    /// No value field was set.
    Unset,
}

impl RawValue {
    pub fn encoding(&self) -> &'static str {
        match self {
            RawValue::Double(_) => "double",
            RawValue::Int64(_) => "int64",
            RawValue::Bool(_) => "bool",
            RawValue::String(_) => "string",
            RawValue::Distribution(_) => "distribution",
            RawValue::Unset => "unset",
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub enum RawMetricKind {
    Gauge,
    Delta,
    Cumulative,
    #[default]
    Unspecified,
    /// A kind this receiver doesn't know about.
    Unknown(Box<str>),
}

impl From<&str> for RawMetricKind {
    fn from(value: &str) -> Self {
        match value {
            "GAUGE" => Self::Gauge,
            "DELTA" => Self::Delta,
            "CUMULATIVE" => Self::Cumulative,
            "" | "METRIC_KIND_UNSPECIFIED" => Self::Unspecified,
            other => Self::Unknown(other.into()),
        }
    }
}

impl std::fmt::Display for RawMetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RawMetricKind::Gauge => "GAUGE",
            RawMetricKind::Delta => "DELTA",
            RawMetricKind::Cumulative => "CUMULATIVE",
            RawMetricKind::Unspecified => "METRIC_KIND_UNSPECIFIED",
            RawMetricKind::Unknown(kind) => kind,
        })
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub enum ValueType {
    Bool,
    Int64,
    Double,
    String,
    Distribution,
    Money,
    #[default]
    Unspecified,
    Unknown(Box<str>),
}

impl From<&str> for ValueType {
    fn from(value: &str) -> Self {
        match value {
            "BOOL" => Self::Bool,
            "INT64" => Self::Int64,
            "DOUBLE" => Self::Double,
            "STRING" => Self::String,
            "DISTRIBUTION" => Self::Distribution,
            "MONEY" => Self::Money,
            "" | "VALUE_TYPE_UNSPECIFIED" => Self::Unspecified,
            other => Self::Unknown(other.into()),
        }
    }
}

/// A decoded `timeSeries.list` response page.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct ListTimeSeriesResponse {
    pub time_series: Vec<RawTimeSeries>,
    /// Empty or absent when this is the last page.
    pub next_page_token: Option<Box<str>>,
}

/// Decode a JSON `timeSeries.list` response body.
pub fn decode_list_response(body: &[u8]) -> Result<ListTimeSeriesResponse, serde_json::Error> {
    let response: wire::ListTimeSeriesResponse = serde_json::from_slice(body)?;

    Ok(response.into())
}

mod wire {
    use super::*;

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct ListTimeSeriesResponse {
        #[serde(default)]
        pub time_series: Vec<TimeSeries>,
        #[serde(default)]
        pub next_page_token: String,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct TimeSeries {
        pub metric: TypedLabels,
        pub resource: TypedLabels,
        pub metadata: Metadata,
        pub metric_kind: String,
        pub value_type: String,
        pub points: Vec<Point>,
        pub unit: String,
        pub description: String,
    }

    #[derive(Deserialize, Default)]
    #[serde(default)]
    pub struct TypedLabels {
        #[serde(rename = "type")]
        pub kind: String,
        pub labels: BTreeMap<CompactString, CompactString>,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct Metadata {
        pub system_labels: BTreeMap<CompactString, serde_json::Value>,
        pub user_labels: BTreeMap<CompactString, CompactString>,
    }

    #[derive(Deserialize)]
    pub struct Point {
        pub interval: Interval,
        #[serde(default)]
        pub value: TypedValue,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Interval {
        pub end_time: DateTime<Utc>,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct TypedValue {
        pub bool_value: Option<bool>,
        #[serde(deserialize_with = "deserialize_int64")]
        pub int64_value: Option<i64>,
        #[serde(deserialize_with = "deserialize_double")]
        pub double_value: Option<f64>,
        pub string_value: Option<String>,
        pub distribution_value: Option<serde_json::Value>,
    }

    impl From<ListTimeSeriesResponse> for super::ListTimeSeriesResponse {
        fn from(value: ListTimeSeriesResponse) -> Self {
            Self {
                time_series: value.time_series.into_iter().map(Into::into).collect(),
                next_page_token: Some(value.next_page_token)
                    .filter(|token| !token.is_empty())
                    .map(String::into_boxed_str),
            }
        }
    }

    impl From<TimeSeries> for RawTimeSeries {
        fn from(ts: TimeSeries) -> Self {
            Self {
                metric_type: ts.metric.kind.into_boxed_str(),
                metric_labels: ts.metric.labels,
                unit: ts.unit.into_boxed_str(),
                description: ts.description.into_boxed_str(),
                metric_kind: RawMetricKind::from(ts.metric_kind.as_str()),
                value_type: ValueType::from(ts.value_type.as_str()),
                resource_type: ts.resource.kind.into_boxed_str(),
                resource_labels: ts.resource.labels,
                metadata_user_labels: ts.metadata.user_labels,
                metadata_system_labels: ts.metadata.system_labels,
                points: ts.points.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl From<Point> for RawPoint {
        fn from(point: Point) -> Self {
            Self {
                // Sub-second precision is dropped here.
                timestamp: point.interval.end_time.timestamp(),
                value: point.value.into(),
            }
        }
    }

    impl From<TypedValue> for RawValue {
        fn from(value: TypedValue) -> Self {
            if let Some(d) = value.double_value {
                RawValue::Double(d)
            } else if let Some(i) = value.int64_value {
                RawValue::Int64(i)
            } else if let Some(b) = value.bool_value {
                RawValue::Bool(b)
            } else if let Some(s) = value.string_value {
                RawValue::String(s.into_boxed_str())
            } else if let Some(dist) = value.distribution_value {
                RawValue::Distribution(dist)
            } else {
                RawValue::Unset
            }
        }
    }

    fn deserialize_int64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Option::<Repr>::deserialize(d)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(n)),
            Some(Repr::Text(s)) => s.parse().map(Some).map_err(de::Error::custom),
        }
    }

    fn deserialize_double<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Option::<Repr>::deserialize(d)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(n)),
            Some(Repr::Text(s)) => match s.as_str() {
                "NaN" => Ok(Some(f64::NAN)),
                "Infinity" => Ok(Some(f64::INFINITY)),
                "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
                other => other.parse().map(Some).map_err(de::Error::custom),
            },
        }
    }
}
