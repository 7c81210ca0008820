//! Cloud Monitoring REST client.
use std::{path::PathBuf, sync::Arc};

use gcm_metrics_common::timeseries::decode_list_response;
use gcp_auth::{CustomServiceAccount, TokenProvider};

use super::{ClientConnector, MetricClient, TimeSeriesPage};
use crate::{config::Config, error::RemoteError, request::ScrapeRequest};

pub const MONITORING_READ_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.read";

const USER_AGENT: &str = concat!("gcm-receiver/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    ServiceAccountKey(PathBuf),
    ApplicationDefault,
}

pub struct HttpConnector {
    endpoint: Box<str>,
    credentials: Credentials,
}

impl HttpConnector {
    pub fn new(endpoint: &str, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').into(),
            credentials,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let credentials = match &config.service_account_key {
            Some(path) => Credentials::ServiceAccountKey(path.clone()),
            None => Credentials::ApplicationDefault,
        };

        Self::new(&config.endpoint, credentials)
    }
}

impl ClientConnector for HttpConnector {
    type Client = HttpMetricClient;

    async fn connect(&self) -> Result<HttpMetricClient, RemoteError> {
        let auth: Arc<dyn TokenProvider> = match &self.credentials {
            Credentials::ServiceAccountKey(path) => {
                tracing::debug!("Loading service account key from {}", path.display());
                Arc::new(CustomServiceAccount::from_file(path).map_err(auth_error)?)
            }
            Credentials::ApplicationDefault => gcp_auth::provider().await.map_err(auth_error)?,
        };

        // Fail at startup rather than on the first cycle.
        auth.token(&[MONITORING_READ_SCOPE])
            .await
            .map_err(auth_error)?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(transport_error)?;

        tracing::info!("Connected to {}", self.endpoint);

        Ok(HttpMetricClient {
            http,
            endpoint: self.endpoint.clone(),
            auth,
        })
    }
}

pub struct HttpMetricClient {
    http: reqwest::Client,
    endpoint: Box<str>,
    auth: Arc<dyn TokenProvider>,
}

impl MetricClient for HttpMetricClient {
    async fn list_time_series(
        &self,
        request: &ScrapeRequest,
        page_token: Option<&str>,
    ) -> Result<TimeSeriesPage, RemoteError> {
        let token = self
            .auth
            .token(&[MONITORING_READ_SCOPE])
            .await
            .map_err(auth_error)?;

        let url = format!("{}/v3/{}/timeSeries", self.endpoint, request.project_path);

        let response = self
            .http
            .get(url)
            .bearer_auth(token.as_str())
            .query(&request.query_pairs(page_token))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into(),
            });
        }

        Ok(decode_list_response(&body)?.into())
    }
}

fn auth_error(err: gcp_auth::Error) -> RemoteError {
    RemoteError::Auth(Box::new(err))
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(Box::new(err))
}
