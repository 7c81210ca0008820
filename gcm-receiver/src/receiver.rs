//! Scrape orchestration.
//!
//! A [`MonitoringReceiver`] owns the remote client and runs one scrape cycle at
//! a time. Services of a cycle are scraped concurrently, each into its own
//! batch which is merged once its stream is complete.
use std::{pin::pin, sync::Arc, time::SystemTime};

use futures::{stream, StreamExt};
use gcm_metrics_common::{
    convert::{ConversionStats, MetricConverter},
    metrics::MetricBatch,
};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    client::ClientConnector,
    config::{Config, ServiceSpec},
    error::{AbortReason, ReceiverError, RemoteError, ScrapeError, ServiceError},
    filter::build_filter,
    paginator::paginate,
    request::ScrapeRequest,
    window::{compute_window, Clock, SystemClock},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Initializing,
    Ready,
    Scraping,
    Shutdown,
}

/// Outcome of one scrape cycle.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub cycle: Uuid,
    pub batch: MetricBatch,
    /// Services skipped during the cycle.
    pub failures: Vec<ServiceError>,
    pub stats: ConversionStats,
}

impl ScrapeReport {
    fn new(cycle: Uuid) -> Self {
        Self {
            cycle,
            ..Default::default()
        }
    }

    fn merge(&mut self, mut scraped: ServiceScrape) {
        self.batch.append(&mut scraped.batch);
        self.stats.merge(scraped.stats);
    }
}

/// Metrics of a single service, complete.
struct ServiceScrape {
    batch: MetricBatch,
    stats: ConversionStats,
}

struct Lifecycle<T> {
    state: ReceiverState,
    cancel: Option<CancellationToken>,
    /// Released at shutdown.
    client: Option<Arc<T>>,
}

pub struct MonitoringReceiver<C: ClientConnector> {
    config: Config,
    connector: C,
    clock: Arc<dyn Clock>,
    connected: OnceCell<()>,
    lifecycle: Mutex<Lifecycle<C::Client>>,
}

impl<C: ClientConnector> MonitoringReceiver<C> {
    pub fn new(config: Config, connector: C) -> Result<Self, ReceiverError> {
        config.validate()?;

        Ok(Self {
            config,
            connector,
            clock: Arc::new(SystemClock),
            connected: OnceCell::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: ReceiverState::Idle,
                cancel: None,
                client: None,
            }),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn state(&self) -> ReceiverState {
        self.lifecycle.lock().state
    }

    /// Connect to the remote API.
    ///
    /// The client is created at most once, concurrent callers wait for the same
    /// connection. A failed connection leaves the receiver idle so that `start`
    /// can be retried.
    pub async fn start(&self, parent: &CancellationToken) -> Result<(), ReceiverError> {
        let cancel = {
            let mut lifecycle = self.lifecycle.lock();

            match lifecycle.state {
                ReceiverState::Shutdown => return Err(ReceiverError::ShutDown),
                ReceiverState::Idle => lifecycle.state = ReceiverState::Initializing,
                _ => {}
            }

            lifecycle
                .cancel
                .get_or_insert_with(|| parent.child_token())
                .clone()
        };

        let connection = self
            .connected
            .get_or_try_init(|| async {
                tracing::info!("Creating monitoring client");

                let client = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RemoteError::Cancelled),
                    client = self.connector.connect() => client,
                }?;

                let mut lifecycle = self.lifecycle.lock();
                if lifecycle.state == ReceiverState::Shutdown {
                    return Err(RemoteError::Cancelled);
                }
                lifecycle.client = Some(Arc::new(client));

                Ok(())
            })
            .await;

        let mut lifecycle = self.lifecycle.lock();

        match connection {
            Ok(_) => {
                if lifecycle.state == ReceiverState::Initializing {
                    lifecycle.state = ReceiverState::Ready;
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!("Unable to create monitoring client: {err}");

                if lifecycle.state == ReceiverState::Initializing {
                    lifecycle.state = ReceiverState::Idle;
                }
                Err(ReceiverError::ClientInit(err))
            }
        }
    }

    /// Run one scrape cycle over every configured service.
    pub async fn scrape(&self) -> Result<ScrapeReport, ScrapeError> {
        let (client, cancel) = self.begin_scrape()?;
        let _guard = ScrapeGuard(&self.lifecycle);

        let cycle = Uuid::new_v4();
        let span = tracing::info_span!("scrape", %cycle);

        let result = self
            .run_cycle(cycle, &client, &cancel)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(report) => tracing::info!(
                metrics = report.batch.len(),
                points = report.batch.data_point_count(),
                skipped_points = report.stats.skipped_points,
                dropped_series = report.stats.dropped_series,
                failed_services = report.failures.len(),
                "Scrape cycle complete"
            ),
            Err(err) => tracing::error!("{err}"),
        });

        result
    }

    /// Cancel every remote call, in flight or future, and release the client.
    pub fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock();

        if lifecycle.state == ReceiverState::Shutdown {
            return;
        }

        tracing::info!("Shutting down receiver");
        lifecycle.state = ReceiverState::Shutdown;

        if let Some(cancel) = &lifecycle.cancel {
            cancel.cancel();
        }

        lifecycle.client = None;
    }

    fn begin_scrape(&self) -> Result<(Arc<C::Client>, CancellationToken), ReceiverError> {
        let mut lifecycle = self.lifecycle.lock();

        match lifecycle.state {
            ReceiverState::Idle | ReceiverState::Initializing => Err(ReceiverError::NotStarted),
            ReceiverState::Scraping => Err(ReceiverError::Busy),
            ReceiverState::Shutdown => Err(ReceiverError::ShutDown),
            ReceiverState::Ready => {
                let client = lifecycle.client.clone();
                let cancel = lifecycle.cancel.clone();

                let (Some(client), Some(cancel)) = (client, cancel) else {
                    return Err(ReceiverError::NotStarted);
                };

                lifecycle.state = ReceiverState::Scraping;
                Ok((client, cancel))
            }
        }
    }

    async fn run_cycle(
        &self,
        cycle: Uuid,
        client: &C::Client,
        cancel: &CancellationToken,
    ) -> Result<ScrapeReport, ScrapeError> {
        let mut report = ScrapeReport::new(cycle);
        let now = self.clock.now();
        let timeout = self.config.scrape_timeout();

        let mut deadline = pin!(tokio::time::sleep(timeout));
        let mut results = stream::iter(&self.config.services)
            .map(|service| {
                self.scrape_service(client, service, now, cancel)
                    .instrument(tracing::debug_span!("service", service = %service.service_name))
            })
            .buffer_unordered(self.config.max_concurrent_services);

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(abort(report, AbortReason::Cancelled)),
                _ = &mut deadline => {
                    return Err(abort(report, AbortReason::DeadlineExceeded(timeout)))
                }
                outcome = results.next() => outcome,
            };

            match outcome {
                None => break,
                Some(Ok(scraped)) => report.merge(scraped),
                Some(Err(ServiceError::RemoteFetch { service, source })) if source.is_client_wide() => {
                    return Err(abort(report, AbortReason::RemoteFetch { service, source }));
                }
                Some(Err(err)) => {
                    tracing::warn!(service = err.service(), "Skipping service: {err}");
                    report.failures.push(err);
                }
            }
        }

        Ok(report)
    }

    async fn scrape_service(
        &self,
        client: &C::Client,
        service: &ServiceSpec,
        now: SystemTime,
        cancel: &CancellationToken,
    ) -> Result<ServiceScrape, ServiceError> {
        let configuration_error = |source| ServiceError::Configuration {
            service: service.service_name.clone(),
            source,
        };

        let window = compute_window(now, self.config.collection_interval(), service.delay())
            .map_err(configuration_error)?;

        let Some(filter) = build_filter(service) else {
            return Err(ServiceError::FilterResolution {
                service: service.service_name.clone(),
            });
        };

        tracing::debug!("Querying with filter {filter}");

        let request = ScrapeRequest::assemble(&self.config.project_id, filter, window, service)
            .map_err(configuration_error)?;

        let mut converter = MetricConverter::default();
        let mut batch = MetricBatch::default();
        let mut series = pin!(paginate(client, &request, cancel));

        while let Some(time_series) = series.next().await {
            let time_series = time_series.map_err(|source| ServiceError::RemoteFetch {
                service: service.service_name.clone(),
                source,
            })?;

            if let Some(metric) = converter.convert(time_series) {
                batch.metrics.push(metric);
            }
        }

        tracing::debug!(metrics = batch.len(), "Service scraped");

        Ok(ServiceScrape {
            batch,
            stats: converter.stats(),
        })
    }
}

fn abort(partial: ScrapeReport, reason: AbortReason) -> ScrapeError {
    ScrapeError::Aborted {
        partial: Box::new(partial),
        reason,
    }
}

/// Returns the receiver to `Ready` when a cycle ends, unless it was shut down.
struct ScrapeGuard<'a, T>(&'a Mutex<Lifecycle<T>>);

impl<T> Drop for ScrapeGuard<'_, T> {
    fn drop(&mut self) {
        let mut lifecycle = self.0.lock();

        if lifecycle.state == ReceiverState::Scraping {
            lifecycle.state = ReceiverState::Ready;
        }
    }
}
