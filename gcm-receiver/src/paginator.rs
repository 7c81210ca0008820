//! Paged result streams.
use async_stream::try_stream;
use futures::Stream;
use gcm_metrics_common::timeseries::RawTimeSeries;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{MetricClient, PageCursor, TimeSeriesPage},
    error::RemoteError,
    request::ScrapeRequest,
};

/// Stream every time series matched by `request`, fetching pages on demand.
///
/// The stream ends after the page with an exhausted cursor, or with the first
/// error. Cancellation interrupts a fetch in flight.
pub fn paginate<'a, C: MetricClient>(
    client: &'a C,
    request: &'a ScrapeRequest,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<RawTimeSeries, RemoteError>> + Send + 'a {
    try_stream! {
        let mut page_token: Option<Box<str>> = None;
        let mut page_count = 0usize;

        loop {
            let page = fetch_page(client, request, page_token.as_deref(), cancel).await?;
            page_count += 1;

            tracing::trace!(page = page_count, series = page.time_series.len(), "Fetched page");

            for time_series in page.time_series {
                yield time_series;
            }

            match page.cursor {
                PageCursor::Next(token) => page_token = Some(token),
                PageCursor::Exhausted => break,
            }
        }
    }
}

async fn fetch_page<C: MetricClient>(
    client: &C,
    request: &ScrapeRequest,
    page_token: Option<&str>,
    cancel: &CancellationToken,
) -> Result<TimeSeriesPage, RemoteError> {
    if cancel.is_cancelled() {
        return Err(RemoteError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RemoteError::Cancelled),
        page = client.list_time_series(request, page_token) => page,
    }
}
