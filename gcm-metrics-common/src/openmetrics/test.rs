use std::collections::BTreeMap;

use crate::metrics::{
    DataPoint, Label, Metric, MetricBatch, MetricKind, NumberValue, Temporality, Timestamp,
};

use super::text::write_metric_batch_text;

const T0: u64 = 1_700_000_000_000_000_000;

fn queue_depth(queue: &str, value: i64) -> Metric {
    Metric {
        name: "custom.googleapis.com/queue/depth".into(),
        unit: "".into(),
        description: "Queue depth".into(),
        kind: MetricKind::Gauge,
        labels: vec![Label {
            name: "queue".into(),
            value: queue.into(),
        }]
        .into(),
        resource_attributes: BTreeMap::from([("resource_type".into(), "global".into())]),
        data_points: vec![DataPoint {
            timestamp: Timestamp(T0),
            value: NumberValue::Int64(value),
        }]
        .into(),
    }
}

#[test]
fn gauge_family_text() {
    let batch = MetricBatch {
        metrics: vec![queue_depth("jobs", 3), queue_depth("mail", 7)],
    };

    let mut output = String::new();
    write_metric_batch_text(&mut output, &batch).unwrap();

    assert_eq!(
        output,
        "# TYPE custom_googleapis_com_queue_depth gauge\n\
         # HELP custom_googleapis_com_queue_depth Queue depth\n\
         custom_googleapis_com_queue_depth{queue=\"jobs\",resource_type=\"global\"} 3 1700000000.000\n\
         custom_googleapis_com_queue_depth{queue=\"mail\",resource_type=\"global\"} 7 1700000000.000\n\
         # EOF\n"
    );
}

#[test]
fn cumulative_sum_is_a_counter() {
    let batch = MetricBatch {
        metrics: vec![Metric {
            name: "compute.googleapis.com/instance/cpu/usage_time".into(),
            unit: "s".into(),
            kind: MetricKind::Sum(Temporality::Cumulative),
            data_points: vec![DataPoint {
                timestamp: Timestamp(T0),
                value: NumberValue::Double(1.5),
            }]
            .into(),
            ..Default::default()
        }],
    };

    let mut output = String::new();
    write_metric_batch_text(&mut output, &batch).unwrap();

    let name = "compute_googleapis_com_instance_cpu_usage_time_s";
    assert_eq!(
        output,
        format!(
            "# TYPE {name} counter\n\
             # UNIT {name} s\n\
             {name}_total{{}} 1.5000 1700000000.000\n\
             # EOF\n"
        )
    );
}

#[test]
fn series_label_shadows_resource_attribute() {
    let mut metric = queue_depth("jobs", 3);
    metric.labels = vec![Label {
        name: "zone".into(),
        value: "a".into(),
    }]
    .into();
    metric.resource_attributes = BTreeMap::from([
        ("project_id".into(), "my-project".into()),
        ("zone".into(), "b".into()),
    ]);

    let mut output = String::new();
    write_metric_batch_text(
        &mut output,
        &MetricBatch {
            metrics: vec![metric],
        },
    )
    .unwrap();

    assert!(output.contains("{zone=\"a\",project_id=\"my-project\"} 3 "));
    assert_eq!(output.matches("zone=").count(), 1);
}

#[test]
fn empty_batch_only_has_eof() {
    let mut output = String::new();
    write_metric_batch_text(&mut output, &MetricBatch::default()).unwrap();

    assert_eq!(output, "# EOF\n");
}
