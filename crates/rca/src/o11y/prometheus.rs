//! Prometheus client
//!
//! Range queries default to the last hour at a 10 minute step so that the
//! LLM gets a compact overview instead of thousands of samples.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use super::format::{self, QueryData, ResultItem, METRIC_NOT_FOUND};
use super::loki::validate_label_name;
use super::{build_http_client, send_json, trim_base, ApiResponse};
use crate::Result;

/// Default step between data points, in seconds.
pub const DEFAULT_STEP: &str = "600";

// 2025-01-01T00:00:00Z ..= 2100-12-31T23:59:59Z
const MIN_UNIX_SECONDS: i64 = 1_735_689_600;
const MAX_UNIX_SECONDS: i64 = 4_133_980_799;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrometheusRangeParams {
    pub query: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
}

impl PrometheusRangeParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Resolve defaults against `now`, replacing invalid values.
    pub fn resolve(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let default_start = (now - ChronoDuration::hours(1)).timestamp();
        let default_end = now.timestamp();

        vec![
            ("query", self.query.clone()),
            ("start", process_timestamp(self.start.as_deref(), "start", default_start)),
            ("end", process_timestamp(self.end.as_deref(), "end", default_end)),
            ("step", process_step(self.step.as_deref())),
        ]
    }
}

/// Accepts RFC3339 or a unix timestamp in seconds or milliseconds that
/// falls between 2025 and the end of 2100.
pub fn timestamp_is_valid(timestamp: &str) -> bool {
    if DateTime::parse_from_rfc3339(timestamp).is_ok() {
        return true;
    }

    let Ok(value) = timestamp.parse::<i64>() else {
        return false;
    };

    (MIN_UNIX_SECONDS..=MAX_UNIX_SECONDS).contains(&value)
        || (MIN_UNIX_SECONDS * 1000..=MAX_UNIX_SECONDS * 1000).contains(&value)
}

fn process_timestamp(value: Option<&str>, name: &str, default: i64) -> String {
    match value.filter(|v| !v.is_empty()) {
        None => default.to_string(),
        Some(ts) if timestamp_is_valid(ts) => ts.to_string(),
        Some(ts) => {
            warn!("{} format ({}) is invalid. Using default.", name, ts);
            default.to_string()
        }
    }
}

fn process_step(step: Option<&str>) -> String {
    match step.filter(|s| !s.is_empty()) {
        None => DEFAULT_STEP.to_string(),
        Some(s) => match s.parse::<i64>() {
            Ok(n) if n > 0 => s.to_string(),
            _ => {
                warn!("step format ({}) is invalid. Using default.", s);
                DEFAULT_STEP.to_string()
            }
        },
    }
}

/// Rows for a metric's series lookup, or a single placeholder row.
pub fn metric_series_rows(series: Vec<BTreeMap<String, String>>) -> Value {
    if series.is_empty() {
        return json!([{ "result": METRIC_NOT_FOUND }]);
    }
    json!(series)
}

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    client: Client,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: trim_base(base_url),
            client: build_http_client(timeout)?,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}/api/v1/{}", self.base_url, path))
    }

    /// Execute a PromQL range query and reshape the matrix.
    pub async fn query_range(&self, params: &PrometheusRangeParams) -> Result<Vec<ResultItem>> {
        info!(promql = %params.query, "PromQL request");

        let pairs = params.resolve(Utc::now());
        let response: ApiResponse<QueryData> =
            send_json(self.get("query_range").query(&pairs)).await?;

        Ok(format::reshape_matrix(response.data.result))
    }

    pub async fn labels(&self) -> Result<Vec<String>> {
        let response: ApiResponse<Vec<String>> = send_json(self.get("labels")).await?;
        Ok(response.data)
    }

    pub async fn label_values(&self, label: &str) -> Result<Vec<String>> {
        validate_label_name(label)?;
        info!(label = %label, "Prometheus label values request");
        let response: ApiResponse<Vec<String>> =
            send_json(self.get(&format!("label/{}/values", label))).await?;
        Ok(response.data)
    }

    /// Every metric name, i.e. the values of `__name__`.
    pub async fn all_metrics(&self) -> Result<Vec<String>> {
        self.label_values("__name__").await
    }

    /// Label sets of every series of a metric.
    pub async fn series(&self, metric: &str) -> Result<Vec<BTreeMap<String, String>>> {
        info!(metric = %metric, "Prometheus series request");
        let response: ApiResponse<Vec<BTreeMap<String, String>>> =
            send_json(self.get("series").query(&[("match[]", metric)])).await?;
        Ok(response.data)
    }
}
