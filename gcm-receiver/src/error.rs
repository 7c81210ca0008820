//! Receiver error types
use std::{error::Error as StdError, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::receiver::ScrapeReport;

/// Invalid or unreadable configuration. Fatal at setup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("\"collection_interval\" must be not lower than {min} seconds, current value is {current} seconds")]
    CollectionIntervalTooShort { min: u64, current: u64 },

    #[error("\"collection_interval\" must be not greater than {max} seconds, current value is {current} seconds")]
    CollectionIntervalTooLong { max: u64, current: u64 },

    #[error("query window of {interval:?} cannot be represented")]
    WindowOutOfRange { interval: Duration },

    #[error("field \"scrape_timeout\" must be positive")]
    ZeroScrapeTimeout,

    #[error("field \"max_concurrent_services\" must be at least 1")]
    NoConcurrency,

    #[error("missing required field \"services\" or its value is empty")]
    NoServices,

    #[error("field \"project_id\" is required and cannot be empty")]
    EmptyProjectId,

    #[error("field \"service_name\" is required and cannot be empty for service configuration")]
    EmptyServiceName,

    #[error("field \"delay\" cannot be negative for service {service}")]
    NegativeDelay { service: Box<str> },

    #[error("fields \"labels_name\" and \"labels_value\" cannot be empty for service {service}")]
    EmptyLabelPair { service: Box<str> },

    #[error("field \"page_size\" must be positive for service {service}")]
    ZeroPageSize { service: Box<str> },

    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure talking to the monitoring API.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    #[error("authentication failure: {0}")]
    Auth(#[source] Box<dyn StdError + Send + Sync>),

    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: Box<str> },

    #[error("unable to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl RemoteError {
    /// Whether the failure affects every request issued through the same client,
    /// as opposed to a single malformed or unknown query.
    pub fn is_client_wide(&self) -> bool {
        match self {
            RemoteError::Status { status, .. } => !matches!(status, 400 | 404),
            RemoteError::Decode(_) => false,
            RemoteError::Transport(_) | RemoteError::Auth(_) | RemoteError::Cancelled => true,
        }
    }
}

/// Failure of a single service during a scrape cycle.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no filter can be built for service {service}")]
    FilterResolution { service: Box<str> },

    #[error("invalid request for service {service}: {source}")]
    Configuration {
        service: Box<str>,
        #[source]
        source: ConfigError,
    },

    #[error("unable to fetch time series for service {service}: {source}")]
    RemoteFetch {
        service: Box<str>,
        #[source]
        source: RemoteError,
    },
}

impl ServiceError {
    pub fn service(&self) -> &str {
        match self {
            ServiceError::FilterResolution { service }
            | ServiceError::Configuration { service, .. }
            | ServiceError::RemoteFetch { service, .. } => service,
        }
    }
}

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("unable to create the monitoring client: {0}")]
    ClientInit(#[source] RemoteError),

    #[error("receiver is not started")]
    NotStarted,

    #[error("a scrape cycle is already running")]
    Busy,

    #[error("receiver is shut down")]
    ShutDown,
}

/// Why a scrape cycle stopped before visiting every service.
#[derive(Error, Debug)]
pub enum AbortReason {
    #[error("remote failure while scraping {service}: {source}")]
    RemoteFetch {
        service: Box<str>,
        #[source]
        source: RemoteError,
    },

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Receiver(#[from] ReceiverError),

    /// The cycle stopped early, `partial` holds what was collected before.
    #[error("scrape cycle aborted: {reason}")]
    Aborted {
        partial: Box<ScrapeReport>,
        #[source]
        reason: AbortReason,
    },
}
