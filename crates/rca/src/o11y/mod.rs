//! Observability backend clients
//!
//! Thin HTTP clients for Loki, Prometheus, Tempo and the Grafana alerting
//! API. Every client reshapes the backend's JSON into the compact form the
//! agent tools and the gateway routes hand back.

pub mod format;
pub mod grafana;
pub mod loki;
pub mod prometheus;
pub mod tempo;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::{config::BackendConfig, Error, Result};

pub use format::{ResultItem, METRIC_NOT_FOUND, NO_DATA_FOUND, TRACE_NOT_FOUND};
pub use grafana::{GrafanaClient, TEST_ALERT_SENTINEL};
pub use loki::{LokiClient, LokiRangeParams};
pub use prometheus::{PrometheusClient, PrometheusRangeParams};
pub use tempo::TempoClient;

/// The standard `{status, data}` envelope of the Loki and Prometheus APIs.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    #[allow(dead_code)]
    #[serde(default)]
    pub status: String,
    pub data: T,
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::Http)
}

/// Send a request and decode the JSON body, turning non-2xx into an error.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Backend {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json::<T>().await?)
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// All three query backends, built from one configuration block.
#[derive(Clone)]
pub struct O11yClients {
    pub loki: LokiClient,
    pub prometheus: PrometheusClient,
    pub tempo: TempoClient,
}

impl O11yClients {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);

        let mut loki = LokiClient::new(&config.loki_url, timeout)?;
        if let Some(tenant) = &config.loki_tenant_id {
            loki = loki.with_tenant_id(tenant.clone());
        }

        Ok(Self {
            loki,
            prometheus: PrometheusClient::new(&config.prometheus_url, timeout)?,
            tempo: TempoClient::new(&config.tempo_url, timeout)?,
        })
    }
}
