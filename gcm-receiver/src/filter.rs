//! Filter expressions for `timeSeries.list`.
use enum_dispatch::enum_dispatch;
use smallvec::SmallVec;

use crate::config::{Filters, LabelPair, ServiceSpec};

/// Default metric type of the builtin compute service.
pub const COMPUTE_DEFAULT_METRIC: &str = "compute.googleapis.com/instance/cpu/usage_time";

#[enum_dispatch]
pub trait FilterSource {
    /// Filter expression, `None` when nothing bounds the query.
    fn filter(&self) -> Option<String>;
}

/// Services known without any filter configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinService {
    Compute,
}

impl BuiltinService {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "compute" => Some(Self::Compute),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Compute => "compute",
        }
    }

    pub fn default_metric_type(self) -> &'static str {
        match self {
            Self::Compute => COMPUTE_DEFAULT_METRIC,
        }
    }
}

impl FilterSource for BuiltinService {
    fn filter(&self) -> Option<String> {
        Some(metric_type_predicate(self.default_metric_type()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplicitMetric {
    pub metric_type: Box<str>,
}

impl FilterSource for ExplicitMetric {
    fn filter(&self) -> Option<String> {
        Some(metric_type_predicate(&self.metric_type))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredFilter {
    pub filters: Filters,
}

impl FilterSource for StructuredFilter {
    fn filter(&self) -> Option<String> {
        let Filters {
            group_id,
            metric_name,
            metric_labels,
            resource_type,
            resource_labels,
            metadata_system_labels,
        } = &self.filters;

        let mut predicates: SmallVec<[String; 8]> = SmallVec::new();

        if let Some(group_id) = non_empty(group_id) {
            predicates.push(predicate("group.id", group_id));
        }

        if let Some(metric_type) = non_empty(metric_name) {
            predicates.push(metric_type_predicate(metric_type));
        }

        push_label_predicates(&mut predicates, "metric.label", metric_labels);

        if let Some(resource_type) = non_empty(resource_type) {
            predicates.push(predicate("resource.type", resource_type));
        }

        push_label_predicates(&mut predicates, "resource.label", resource_labels);
        push_label_predicates(
            &mut predicates,
            "metadata.system_labels",
            metadata_system_labels,
        );

        (!predicates.is_empty()).then(|| predicates.join(" AND "))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unrecognized;

impl FilterSource for Unrecognized {
    fn filter(&self) -> Option<String> {
        None
    }
}

/// How a service is turned into a filter.
#[enum_dispatch(FilterSource)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceFamily {
    ExplicitMetric,
    Builtin(BuiltinService),
    Structured(StructuredFilter),
    Unrecognized,
}

impl ServiceFamily {
    /// An explicit metric name wins over a builtin service, which wins over
    /// structured filters.
    pub fn resolve(service: &ServiceSpec) -> Self {
        if let Some(metric_type) = non_empty(&service.metric_name) {
            return ExplicitMetric {
                metric_type: metric_type.into(),
            }
            .into();
        }

        if let Some(builtin) = BuiltinService::from_name(&service.service_name) {
            return builtin.into();
        }

        match &service.filters {
            Some(filters) => StructuredFilter {
                filters: filters.clone(),
            }
            .into(),
            None => Unrecognized.into(),
        }
    }
}

/// Filter expression of a service, `None` when it cannot be bounded.
pub fn build_filter(service: &ServiceSpec) -> Option<String> {
    ServiceFamily::resolve(service).filter()
}

fn non_empty(value: &Option<Box<str>>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn metric_type_predicate(metric_type: &str) -> String {
    predicate("metric.type", metric_type)
}

fn push_label_predicates(predicates: &mut SmallVec<[String; 8]>, prefix: &str, labels: &[LabelPair]) {
    predicates.extend(
        labels
            .iter()
            .map(|LabelPair { name, value }| predicate(&format!("{prefix}.{name}"), value)),
    );
}

fn predicate(selector: &str, value: &str) -> String {
    let mut out = String::with_capacity(selector.len() + value.len() + 5);
    out.push_str(selector);
    out.push_str(" = \"");

    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }

    out.push('"');
    out
}
