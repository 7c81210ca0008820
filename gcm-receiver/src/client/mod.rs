//! Remote monitoring API client.
//!
//! [`MetricClient`] fetches one page of a `timeSeries.list` query. Clients are
//! created by a [`ClientConnector`] once per receiver and shared between the
//! services of every cycle.
use std::future::Future;

use gcm_metrics_common::timeseries::{ListTimeSeriesResponse, RawTimeSeries};

use crate::{error::RemoteError, request::ScrapeRequest};

pub mod http;
pub mod mock;

/// Position after a fetched page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageCursor {
    Next(Box<str>),
    Exhausted,
}

#[derive(Debug, Default)]
pub struct TimeSeriesPage {
    pub time_series: Vec<RawTimeSeries>,
    pub cursor: PageCursor,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::Exhausted
    }
}

impl From<ListTimeSeriesResponse> for TimeSeriesPage {
    fn from(response: ListTimeSeriesResponse) -> Self {
        Self {
            time_series: response.time_series,
            cursor: match response.next_page_token {
                Some(token) => PageCursor::Next(token),
                None => PageCursor::Exhausted,
            },
        }
    }
}

pub trait MetricClient: Send + Sync {
    /// Fetch the page starting at `page_token`, or at the request's own token
    /// when `None`.
    fn list_time_series(
        &self,
        request: &ScrapeRequest,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<TimeSeriesPage, RemoteError>> + Send;
}

pub trait ClientConnector: Send + Sync {
    type Client: MetricClient + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Client, RemoteError>> + Send;
}
