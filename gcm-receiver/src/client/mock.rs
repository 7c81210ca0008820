//! Scripted in-memory client.
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use gcm_metrics_common::timeseries::RawTimeSeries;
use parking_lot::Mutex;

use super::{ClientConnector, MetricClient, PageCursor, TimeSeriesPage};
use crate::{error::RemoteError, request::ScrapeRequest};

/// Scripted answer to one page fetch.
#[derive(Debug)]
pub enum MockPage {
    Page(Vec<RawTimeSeries>),
    Fail(RemoteError),
    /// Never answers, for cancellation tests.
    Hang,
}

/// A request seen by the mock.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub request: ScrapeRequest,
    pub page_token: Option<Box<str>>,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: Mutex<HashMap<Box<str>, VecDeque<MockPage>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Client answering from per-filter page scripts.
///
/// Pages of a filter are handed out in order, a page is followed by a
/// [`PageCursor::Next`] cursor while more script entries remain. Filters
/// without a script yield one empty page.
#[derive(Clone, Debug, Default)]
pub struct MockMetricClient {
    state: Arc<MockState>,
}

impl MockMetricClient {
    pub fn script(&self, filter: &str, pages: impl IntoIterator<Item = MockPage>) {
        self.state
            .scripts
            .lock()
            .entry(filter.into())
            .or_default()
            .extend(pages);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Number of live clones of this client.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }
}

impl MetricClient for MockMetricClient {
    async fn list_time_series(
        &self,
        request: &ScrapeRequest,
        page_token: Option<&str>,
    ) -> Result<TimeSeriesPage, RemoteError> {
        self.state.requests.lock().push(RecordedRequest {
            request: request.clone(),
            page_token: page_token.map(Into::into),
        });

        let (page, remaining) = {
            let mut scripts = self.state.scripts.lock();
            let mut script = scripts.get_mut(&request.filter);
            let page = script.as_mut().and_then(|s| s.pop_front());
            (page, script.map_or(0, |s| s.len()))
        };

        // Let concurrent services interleave.
        tokio::task::yield_now().await;

        match page {
            None => Ok(TimeSeriesPage::default()),
            Some(MockPage::Page(time_series)) => Ok(TimeSeriesPage {
                time_series,
                cursor: match remaining {
                    0 => PageCursor::Exhausted,
                    n => PageCursor::Next(format!("page-{n}").into()),
                },
            }),
            Some(MockPage::Fail(err)) => Err(err),
            Some(MockPage::Hang) => std::future::pending().await,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectBehavior {
    #[default]
    Succeed,
    Fail,
    Hang,
}

/// Connector handing out clones of one [`MockMetricClient`].
#[derive(Debug, Default)]
pub struct MockConnector {
    client: MockMetricClient,
    behavior: ConnectBehavior,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(client: MockMetricClient) -> Self {
        Self {
            client,
            ..Default::default()
        }
    }

    pub fn with_behavior(client: MockMetricClient, behavior: ConnectBehavior) -> Self {
        Self {
            client,
            behavior,
            connects: AtomicUsize::new(0),
        }
    }

    /// Number of connection attempts so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl ClientConnector for MockConnector {
    type Client = MockMetricClient;

    async fn connect(&self) -> Result<MockMetricClient, RemoteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        match self.behavior {
            ConnectBehavior::Succeed => Ok(self.client.clone()),
            ConnectBehavior::Fail => Err(RemoteError::Auth("no credentials".into())),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}
