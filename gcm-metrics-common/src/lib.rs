//! gcm-metrics common library
pub mod convert;
pub mod metrics;
pub mod openmetrics;
pub mod timeseries;

#[cfg(test)]
mod test;
