use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gcm_metrics_common::{
    convert::MetricConverter, metrics::MetricBatch, openmetrics::text::write_metric_batch_text,
    timeseries::decode_list_response,
};

/// Convert a saved `timeSeries.list` response into OpenMetrics text.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON response body, as returned by the monitoring API.
    response: PathBuf,

    /// Only print conversion statistics.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let body = fs::read(&args.response)
        .with_context(|| format!("Unable to read {}", args.response.display()))?;
    let response = decode_list_response(&body).context("Invalid timeSeries.list response")?;

    if let Some(token) = &response.next_page_token {
        eprintln!("Response is not the last page (next page token: {token})");
    }

    let mut converter = MetricConverter::default();
    let batch: MetricBatch = response
        .time_series
        .into_iter()
        .filter_map(|ts| converter.convert(ts))
        .collect();

    if !args.quiet {
        let mut output = String::new();
        write_metric_batch_text(&mut output, &batch)?;
        print!("{output}");
    }

    let stats = converter.stats();
    eprintln!(
        "{} series converted, {} dropped, {} points skipped",
        stats.converted_series, stats.dropped_series, stats.skipped_points
    );

    Ok(())
}
