//! Receiver configuration.
//!
//! The configuration is a JSON document loaded once at startup. Every field that
//! is not required has a serde default, [`Config::validate`] checks the rest.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{error::ConfigError, filter::BuiltinService, request::ResultView};

/// Lowest accepted collection interval.
pub const MIN_COLLECTION_INTERVAL: Duration = Duration::from_secs(60);
/// Highest accepted collection interval, one day.
pub const MAX_COLLECTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_ENDPOINT: &str = "https://monitoring.googleapis.com";
pub const DEFAULT_MAX_CONCURRENT_SERVICES: usize = 4;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub project_id: Box<str>,

    /// Seconds between two scrape cycles.
    #[serde(default = "default_collection_interval")]
    pub collection_interval: u64,

    /// Seconds a whole cycle may take, defaults to the collection interval.
    #[serde(default)]
    pub scrape_timeout: Option<u64>,

    #[serde(default = "default_max_concurrent_services")]
    pub max_concurrent_services: usize,

    #[serde(default = "default_endpoint")]
    pub endpoint: Box<str>,

    /// Service account key file, application default credentials otherwise.
    #[serde(default)]
    pub service_account_key: Option<PathBuf>,

    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

fn default_collection_interval() -> u64 {
    MIN_COLLECTION_INTERVAL.as_secs()
}

fn default_max_concurrent_services() -> usize {
    DEFAULT_MAX_CONCURRENT_SERVICES
}

fn default_endpoint() -> Box<str> {
    DEFAULT_ENDPOINT.into()
}

impl Default for Config {
    /// Scrape the builtin compute service every minute, four minutes behind
    /// (compute metrics are published with that latency).
    fn default() -> Self {
        Self {
            project_id: "".into(),
            collection_interval: default_collection_interval(),
            scrape_timeout: None,
            max_concurrent_services: DEFAULT_MAX_CONCURRENT_SERVICES,
            endpoint: default_endpoint(),
            service_account_key: None,
            services: vec![ServiceSpec {
                delay: 240,
                ..ServiceSpec::new(BuiltinService::Compute.name())
            }],
        }
    }
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_slice(&content)
    }

    pub fn from_slice(content: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_slice(content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_interval < MIN_COLLECTION_INTERVAL.as_secs() {
            return Err(ConfigError::CollectionIntervalTooShort {
                min: MIN_COLLECTION_INTERVAL.as_secs(),
                current: self.collection_interval,
            });
        }

        if self.collection_interval > MAX_COLLECTION_INTERVAL.as_secs() {
            return Err(ConfigError::CollectionIntervalTooLong {
                max: MAX_COLLECTION_INTERVAL.as_secs(),
                current: self.collection_interval,
            });
        }

        if self.scrape_timeout == Some(0) {
            return Err(ConfigError::ZeroScrapeTimeout);
        }

        if self.max_concurrent_services == 0 {
            return Err(ConfigError::NoConcurrency);
        }

        if self.project_id.is_empty() {
            return Err(ConfigError::EmptyProjectId);
        }

        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        self.services.iter().try_for_each(ServiceSpec::validate)
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval)
    }

    pub fn scrape_timeout(&self) -> Duration {
        self.scrape_timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.collection_interval())
    }
}

/// One scraped service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    pub service_name: Box<str>,

    /// Seconds the query window lags behind the current time.
    #[serde(default)]
    pub delay: i64,

    #[serde(default)]
    pub metric_name: Option<Box<str>>,

    #[serde(default)]
    pub filters: Option<Filters>,

    #[serde(default)]
    pub aggregation: Option<Aggregation>,

    #[serde(default)]
    pub secondary_aggregation: Option<Aggregation>,

    #[serde(default)]
    pub order_by: Option<Box<str>>,

    #[serde(default)]
    pub view: ResultView,

    #[serde(default)]
    pub page_size: Option<u32>,

    #[serde(default)]
    pub page_token: Option<Box<str>>,
}

impl ServiceSpec {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }

        if self.delay < 0 {
            return Err(ConfigError::NegativeDelay {
                service: self.service_name.clone(),
            });
        }

        if self.page_size == Some(0) {
            return Err(ConfigError::ZeroPageSize {
                service: self.service_name.clone(),
            });
        }

        if let Some(filters) = &self.filters {
            let all_pairs = filters
                .metric_labels
                .iter()
                .chain(&filters.resource_labels)
                .chain(&filters.metadata_system_labels);

            for pair in all_pairs {
                if pair.name.is_empty() || pair.value.is_empty() {
                    return Err(ConfigError::EmptyLabelPair {
                        service: self.service_name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay.max(0).unsigned_abs())
    }
}

/// Structured filter predicates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filters {
    #[serde(default)]
    pub group_id: Option<Box<str>>,

    #[serde(default)]
    pub metric_name: Option<Box<str>>,

    #[serde(default)]
    pub metric_labels: Vec<LabelPair>,

    #[serde(default)]
    pub resource_type: Option<Box<str>>,

    #[serde(default)]
    pub resource_labels: Vec<LabelPair>,

    #[serde(default)]
    pub metadata_system_labels: Vec<LabelPair>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LabelPair {
    #[serde(alias = "labels_name")]
    pub name: Box<str>,
    #[serde(alias = "labels_value")]
    pub value: Box<str>,
}

impl LabelPair {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Alignment and reduction settings, passed through to the API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Aggregation {
    /// Duration string such as `"60s"`.
    #[serde(default, alias = "alignmentPeriod")]
    pub alignment_period: Option<Box<str>>,

    #[serde(default, alias = "perSeriesAligner")]
    pub per_series_aligner: Option<Box<str>>,

    #[serde(default, alias = "crossSeriesReducer")]
    pub cross_series_reducer: Option<Box<str>>,

    #[serde(default, alias = "groupByFields")]
    pub group_by_fields: Vec<Box<str>>,
}
