use std::{borrow::Cow, collections::BTreeMap, fmt::Write};

use anyhow::Result;
use compact_str::CompactString;

use crate::metrics::{
    DataPoint, Metric, MetricBatch, MetricKind, NumberValue, Temporality, Timestamp,
};

fn metric_kind_to_str(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Gauge => "gauge",
        MetricKind::Sum(Temporality::Cumulative) => "counter",
        // A windowed increment can go down between windows.
        MetricKind::Sum(Temporality::Delta) => "gauge",
    }
}

fn escape_string(s: &str) -> String {
    s.escape_default().collect()
}

fn format_name(s: &str, allow_colon: bool, keep_underscores: bool) -> String {
    s.char_indices()
        .filter_map(|(pos, c)| match c {
            c @ 'A'..='Z' => Some(c),
            c @ 'a'..='z' => Some(c),
            c @ '0'..='9' if pos != 0 => Some(c),
            ':' if allow_colon => Some(':'),
            '_' if keep_underscores => Some('_'),
            // Cloud Monitoring metric types are paths, e.g. `compute.googleapis.com/instance/...`
            '.' | '/' | '-' if keep_underscores => Some('_'),
            _ => None,
        })
        .collect()
}

/// Write a batch in the OpenMetrics text format.
///
/// Metrics sharing a name are grouped in the same family, the first metric of
/// a family provides its type, unit and help.
pub fn write_metric_batch_text<W: Write>(writer: &mut W, batch: &MetricBatch) -> Result<()> {
    let mut families: BTreeMap<&str, Vec<&Metric>> = BTreeMap::new();

    for metric in &batch.metrics {
        families.entry(&metric.name).or_default().push(metric);
    }

    for (name, metrics) in families {
        let name = format_name(name, true, true);

        write_family(writer, &name, &metrics)?;
    }

    writeln!(writer, "# EOF")?;

    Ok(())
}

fn write_family<W: Write>(writer: &mut W, name: &str, metrics: &[&Metric]) -> Result<()> {
    let Some(first) = metrics.first() else {
        return Ok(());
    };

    // Remove all non-ascii characters from unit.
    let unit_escaped = format_name(&first.unit, true, false);

    // Add the unit suffix (if relevant)
    let name = if !unit_escaped.is_empty() {
        Cow::Owned(format!("{name}_{unit_escaped}"))
    } else {
        Cow::Borrowed(name)
    };

    writeln!(writer, "# TYPE {name} {}", metric_kind_to_str(first.kind))?;

    if !unit_escaped.is_empty() {
        writeln!(writer, "# UNIT {name} {unit_escaped}")?;
    }

    if !first.description.is_empty() {
        writeln!(writer, "# HELP {name} {}", escape_string(&first.description))?;
    }

    for metric in metrics {
        write_metric(writer, &name, metric)?;
    }

    Ok(())
}

fn format_number_value(value: &NumberValue) -> String {
    match value {
        NumberValue::Double(value) => format!("{value:.4}"),
        NumberValue::Int64(value) => value.to_string(),
    }
}

fn format_timestamp(Timestamp(nanos): Timestamp) -> String {
    format!("{}.{:03}", nanos / 1_000_000_000, (nanos % 1_000_000_000) / 1_000_000)
}

fn format_label(name: &str, value: &str) -> String {
    format!(
        "{}=\"{}\"",
        format_name(name, false, true),
        value.escape_default().collect::<String>()
    )
}

/// Series labels win over resource attributes of the same name.
fn format_labels(metric: &Metric) -> String {
    let shadowed = |name: &CompactString| metric.labels.iter().any(|label| label.name == *name);

    metric
        .labels
        .iter()
        .map(|label| format_label(&label.name, &label.value))
        .chain(
            metric
                .resource_attributes
                .iter()
                .filter(|(name, _)| !shadowed(name))
                .map(|(name, value)| format_label(name, value)),
        )
        .collect::<Vec<String>>()
        .join(",")
}

fn write_metric<W: Write>(writer: &mut W, name: &str, metric: &Metric) -> Result<()> {
    let labels = format_labels(metric);
    let suffix = match metric.kind {
        MetricKind::Sum(Temporality::Cumulative) => "_total",
        _ => "",
    };

    for DataPoint { timestamp, value } in metric.data_points.iter() {
        writeln!(
            writer,
            "{name}{suffix}{{{labels}}} {} {}",
            format_number_value(value),
            format_timestamp(*timestamp)
        )?;
    }

    Ok(())
}
