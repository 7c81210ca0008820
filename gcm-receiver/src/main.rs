use std::path::PathBuf;

use argh::FromArgs;
use gcm_metrics_common::metrics::MetricBatch;
use gcm_receiver::{
    client::http::HttpConnector,
    config::Config,
    consumer::{MetricsConsumer, TextExporter},
    error::ScrapeError,
    receiver::MonitoringReceiver,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// gcm-metrics Cloud Monitoring receiver.
#[derive(Clone, FromArgs, Debug)]
struct Args {
    /// path to the JSON configuration
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// logging level
    #[argh(option, short = 'l', default = "tracing::Level::INFO")]
    log_level: tracing::Level,

    /// run a single scrape cycle then exit
    #[argh(switch)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let text_subscriber = tracing_subscriber::fmt()
        .with_ansi(true)
        .with_max_level(args.log_level)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(text_subscriber)?;

    let config = Config::load(&args.config)?;
    let connector = HttpConnector::from_config(&config);
    let receiver = MonitoringReceiver::new(config, connector)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Unable to listen for shutdown signal: {e}");
            }
            shutdown.cancel();
        }
    });

    receiver.start(&shutdown).await?;

    let (batch_sender, batch_receiver) = flume::unbounded::<MetricBatch>();

    let exporter = tokio::spawn(async move {
        let mut exporter = TextExporter::stdout();

        while let Ok(batch) = batch_receiver.recv_async().await {
            if let Err(e) = exporter.consume(&batch).await {
                tracing::error!("Unable to export metrics: {e}");
            }
        }
    });

    let mut ticker = tokio::time::interval(receiver.config().collection_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let batch = match receiver.scrape().await {
            Ok(report) => report.batch,
            // Keep what was collected before the failure.
            Err(ScrapeError::Aborted { partial, .. }) => partial.batch,
            Err(e) => {
                tracing::error!("Scrape failed: {e}");
                MetricBatch::default()
            }
        };

        if !batch.is_empty() && batch_sender.send_async(batch).await.is_err() {
            tracing::warn!("Exporter stopped");
            break;
        }

        if args.once {
            break;
        }
    }

    tracing::info!("Stopping");
    receiver.shutdown();

    drop(batch_sender);
    exporter.await?;

    Ok(())
}
