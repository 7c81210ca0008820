//! Conversion and decoding tests

use std::collections::BTreeMap;

use serde_json::json;

use crate::{
    convert::{convert_time_series, ConversionError, ConversionStats, MetricConverter},
    metrics::{DataPoint, Label, MetricKind, NumberValue, Temporality, Timestamp},
    timeseries::{decode_list_response, RawMetricKind, RawPoint, RawTimeSeries, RawValue, ValueType},
};

const T1: i64 = 1_700_000_000;
const T2: i64 = 1_700_000_060;

pub(crate) fn make_test_time_series(kind: RawMetricKind, values: Vec<RawValue>) -> RawTimeSeries {
    RawTimeSeries {
        metric_type: "compute.googleapis.com/instance/cpu/usage_time".into(),
        metric_labels: BTreeMap::from([("instance_name".into(), "vm-1".into())]),
        unit: "s".into(),
        metric_kind: kind,
        value_type: ValueType::Double,
        resource_type: "gce_instance".into(),
        resource_labels: BTreeMap::from([("zone".into(), "europe-west1-b".into())]),
        metadata_user_labels: BTreeMap::from([("team".into(), "infra".into())]),
        metadata_system_labels: BTreeMap::from([
            ("state".into(), json!("ACTIVE")),
            ("spot".into(), json!(false)),
            ("tags".into(), json!(["a", "b"])),
        ]),
        points: values
            .into_iter()
            .enumerate()
            .map(|(i, value)| RawPoint {
                timestamp: T1 + 60 * i as i64,
                value,
            })
            .collect(),
        ..Default::default()
    }
}

fn ns(seconds: i64) -> Timestamp {
    Timestamp(seconds as u64 * 1_000_000_000)
}

#[test]
fn gauge_keeps_values_and_order() {
    let ts = make_test_time_series(
        RawMetricKind::Gauge,
        vec![RawValue::Double(3.5), RawValue::Int64(7)],
    );

    let conversion = convert_time_series(ts).unwrap();

    assert!(conversion.skipped.is_empty());
    assert_eq!(conversion.metric.kind, MetricKind::Gauge);
    assert_eq!(
        conversion.metric.data_points.as_ref(),
        &[
            DataPoint {
                timestamp: ns(T1),
                value: NumberValue::Double(3.5),
            },
            DataPoint {
                timestamp: ns(T2),
                value: NumberValue::Int64(7),
            },
        ]
    );
    assert_eq!(
        conversion
            .metric
            .data_points
            .iter()
            .map(|dp| dp.value.as_f64())
            .collect::<Vec<_>>(),
        vec![3.5, 7.0]
    );
}

#[test]
fn descending_timestamps_are_not_resorted() {
    let mut ts = make_test_time_series(
        RawMetricKind::Gauge,
        vec![RawValue::Double(1.0), RawValue::Double(2.0)],
    );
    ts.points.reverse();

    let metric = convert_time_series(ts).unwrap().metric;

    assert_eq!(metric.data_points[0].timestamp, ns(T2));
    assert_eq!(metric.data_points[1].timestamp, ns(T1));
}

#[test]
fn cumulative_and_delta_are_sums() {
    let cumulative = make_test_time_series(RawMetricKind::Cumulative, vec![RawValue::Double(10.0)]);
    let delta = make_test_time_series(RawMetricKind::Delta, vec![RawValue::Int64(4)]);

    let cumulative = convert_time_series(cumulative).unwrap().metric;
    let delta = convert_time_series(delta).unwrap().metric;

    assert_eq!(cumulative.kind, MetricKind::Sum(Temporality::Cumulative));
    assert_eq!(delta.kind, MetricKind::Sum(Temporality::Delta));
    // Sums are floating point.
    assert_eq!(delta.data_points[0].value, NumberValue::Double(4.0));
}

#[test]
fn unknown_kind_is_unsupported() {
    for kind in [
        RawMetricKind::Unspecified,
        RawMetricKind::Unknown("HISTOGRAM".into()),
    ] {
        let ts = make_test_time_series(kind.clone(), vec![RawValue::Double(1.0)]);

        assert_eq!(
            convert_time_series(ts),
            Err(ConversionError::UnsupportedMetricKind {
                metric: "compute.googleapis.com/instance/cpu/usage_time".into(),
                kind,
            })
        );
    }
}

#[test]
fn unsupported_gauge_value_is_reported() {
    let ts = make_test_time_series(
        RawMetricKind::Gauge,
        vec![
            RawValue::Double(1.0),
            RawValue::String("up".into()),
            RawValue::Bool(true),
        ],
    );

    let conversion = convert_time_series(ts).unwrap();

    assert_eq!(conversion.metric.data_points.len(), 1);
    assert_eq!(conversion.skipped.len(), 2);
    assert!(matches!(
        conversion.skipped[0],
        ConversionError::UnsupportedValueType {
            encoding: "string",
            kind: MetricKind::Gauge,
            ..
        }
    ));
}

#[test]
fn negative_timestamp_is_skipped() {
    let mut ts = make_test_time_series(RawMetricKind::Gauge, vec![RawValue::Double(1.0)]);
    ts.points[0].timestamp = -1;

    let conversion = convert_time_series(ts).unwrap();

    assert!(conversion.metric.data_points.is_empty());
    assert!(matches!(
        conversion.skipped[0],
        ConversionError::InvalidTimestamp { seconds: -1, .. }
    ));
}

#[test]
fn resource_attributes_are_folded() {
    let ts = make_test_time_series(RawMetricKind::Gauge, vec![]);

    let metric = convert_time_series(ts).unwrap().metric;

    let attributes: Vec<(&str, &str)> = metric
        .resource_attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    assert_eq!(
        attributes,
        vec![
            ("resource_type", "gce_instance"),
            ("spot", "false"),
            ("state", "ACTIVE"),
            ("tags", "[\"a\",\"b\"]"),
            ("team", "infra"),
            ("zone", "europe-west1-b"),
        ]
    );
    assert_eq!(
        metric.labels.as_ref(),
        &[Label {
            name: "instance_name".into(),
            value: "vm-1".into()
        }]
    );
    assert_eq!(metric.name.as_ref(), "compute.googleapis.com/instance/cpu/usage_time");
    assert_eq!(metric.unit.as_ref(), "s");
}

#[test]
fn converter_counts_drops() {
    let mut converter = MetricConverter::default();

    let kept = converter.convert(make_test_time_series(
        RawMetricKind::Gauge,
        vec![RawValue::Double(1.0), RawValue::Unset],
    ));
    let dropped = converter.convert(make_test_time_series(
        RawMetricKind::Unspecified,
        vec![RawValue::Double(1.0)],
    ));

    assert!(kept.is_some());
    assert!(dropped.is_none());
    assert_eq!(
        converter.stats(),
        ConversionStats {
            converted_series: 1,
            dropped_series: 1,
            skipped_points: 1,
        }
    );
}

#[test]
fn decode_response_page() {
    let body = json!({
        "timeSeries": [{
            "metric": {
                "type": "compute.googleapis.com/instance/cpu/usage_time",
                "labels": { "instance_name": "vm-1" }
            },
            "resource": {
                "type": "gce_instance",
                "labels": { "zone": "europe-west1-b", "project_id": "my-project" }
            },
            "metadata": {
                "systemLabels": { "state": "ACTIVE", "spot": false },
                "userLabels": { "team": "infra" }
            },
            "metricKind": "DELTA",
            "valueType": "INT64",
            "unit": "s",
            "points": [
                {
                    "interval": {
                        "startTime": "2023-11-14T22:12:20Z",
                        "endTime": "2023-11-14T22:13:20.500Z"
                    },
                    "value": { "int64Value": "42" }
                },
                {
                    "interval": { "endTime": "2023-11-14T22:12:20Z" },
                    "value": { "doubleValue": "NaN" }
                }
            ]
        }],
        "nextPageToken": "abc"
    });

    let response = decode_list_response(body.to_string().as_bytes()).unwrap();

    assert_eq!(response.next_page_token.as_deref(), Some("abc"));
    assert_eq!(response.time_series.len(), 1);

    let ts = &response.time_series[0];
    assert_eq!(ts.metric_kind, RawMetricKind::Delta);
    assert_eq!(ts.value_type, ValueType::Int64);
    assert_eq!(ts.resource_type.as_ref(), "gce_instance");
    assert_eq!(ts.metadata_system_labels["spot"], json!(false));
    assert_eq!(ts.points[0].timestamp, 1_700_000_000);
    assert_eq!(ts.points[0].value, RawValue::Int64(42));
    assert_eq!(ts.points[1].timestamp, 1_699_999_940);
    assert!(matches!(ts.points[1].value, RawValue::Double(d) if d.is_nan()));
}

#[test]
fn decode_last_and_empty_pages() {
    let response = decode_list_response(br#"{"nextPageToken": ""}"#).unwrap();
    assert!(response.time_series.is_empty());
    assert_eq!(response.next_page_token, None);

    let response = decode_list_response(b"{}").unwrap();
    assert!(response.time_series.is_empty());
    assert_eq!(response.next_page_token, None);
}

#[test]
fn decode_rejects_malformed_timestamps() {
    let body = br#"{"timeSeries": [{"points": [{"interval": {"endTime": "yesterday"}}]}]}"#;

    assert!(decode_list_response(body).is_err());
}
