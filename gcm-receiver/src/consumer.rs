//! Destinations of scraped metrics.
use std::future::Future;

use gcm_metrics_common::{metrics::MetricBatch, openmetrics::text::write_metric_batch_text};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub trait MetricsConsumer: Send {
    fn consume(&mut self, batch: &MetricBatch) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Writes batches as OpenMetrics text.
pub struct TextExporter<W> {
    writer: W,
}

impl TextExporter<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> TextExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Send + Unpin> MetricsConsumer for TextExporter<W> {
    async fn consume(&mut self, batch: &MetricBatch) -> anyhow::Result<()> {
        let mut buffer = String::new();
        write_metric_batch_text(&mut buffer, batch)?;

        self.writer.write_all(buffer.as_bytes()).await?;
        self.writer.flush().await?;

        Ok(())
    }
}
