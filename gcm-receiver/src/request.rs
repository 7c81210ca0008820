//! `timeSeries.list` request descriptors.
use serde::Deserialize;

use crate::{
    config::{Aggregation, ServiceSpec},
    error::ConfigError,
    window::QueryWindow,
};

/// Amount of data returned for each series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultView {
    #[default]
    Full,
    /// Series descriptors without points.
    Headers,
}

impl ResultView {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultView::Full => "FULL",
            ResultView::Headers => "HEADERS",
        }
    }
}

/// Query issued for one service during one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrapeRequest {
    /// `projects/<id>`
    pub project_path: Box<str>,
    pub filter: Box<str>,
    pub window: QueryWindow,
    pub view: ResultView,
    pub aggregation: Option<Aggregation>,
    pub secondary_aggregation: Option<Aggregation>,
    pub order_by: Option<Box<str>>,
    pub page_size: Option<u32>,
    /// Token of the first page to fetch.
    pub page_token: Option<Box<str>>,
}

impl ScrapeRequest {
    pub fn assemble(
        project_id: &str,
        filter: String,
        window: QueryWindow,
        service: &ServiceSpec,
    ) -> Result<Self, ConfigError> {
        if project_id.is_empty() {
            return Err(ConfigError::EmptyProjectId);
        }

        Ok(Self {
            project_path: format!("projects/{project_id}").into_boxed_str(),
            filter: filter.into_boxed_str(),
            window,
            view: service.view,
            aggregation: service.aggregation.clone(),
            secondary_aggregation: service.secondary_aggregation.clone(),
            order_by: service.order_by.clone(),
            page_size: service.page_size,
            page_token: service.page_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// URL query parameters, `page_token` replaces the initial token.
    pub fn query_pairs(&self, page_token: Option<&str>) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("filter".to_string(), self.filter.to_string()),
            ("interval.startTime".to_string(), self.window.start_rfc3339()),
            ("interval.endTime".to_string(), self.window.end_rfc3339()),
            ("view".to_string(), self.view.as_str().to_string()),
        ];

        if let Some(aggregation) = &self.aggregation {
            push_aggregation(&mut pairs, "aggregation", aggregation);
        }

        if let Some(aggregation) = &self.secondary_aggregation {
            push_aggregation(&mut pairs, "secondaryAggregation", aggregation);
        }

        if let Some(order_by) = &self.order_by {
            pairs.push(("orderBy".to_string(), order_by.to_string()));
        }

        if let Some(page_size) = self.page_size {
            pairs.push(("pageSize".to_string(), page_size.to_string()));
        }

        if let Some(token) = page_token.or(self.page_token.as_deref()) {
            pairs.push(("pageToken".to_string(), token.to_string()));
        }

        pairs
    }
}

fn push_aggregation(pairs: &mut Vec<(String, String)>, prefix: &str, aggregation: &Aggregation) {
    let Aggregation {
        alignment_period,
        per_series_aligner,
        cross_series_reducer,
        group_by_fields,
    } = aggregation;

    let fields = [
        ("alignmentPeriod", alignment_period),
        ("perSeriesAligner", per_series_aligner),
        ("crossSeriesReducer", cross_series_reducer),
    ];

    for (name, value) in fields {
        if let Some(value) = value {
            pairs.push((format!("{prefix}.{name}"), value.to_string()));
        }
    }

    for field in group_by_fields {
        pairs.push((format!("{prefix}.groupByFields"), field.to_string()));
    }
}
