//! Loki client
//!
//! Wraps the Loki HTTP API endpoints the RCA agent relies on: range queries,
//! label discovery and series lookup by selector.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use super::format::{self, QueryData, ResultItem};
use super::{build_http_client, send_json, trim_base, ApiResponse};
use crate::{Error, Result};

/// Parameters of a `query_range` call. Everything but `query` falls back
/// to Loki's own defaults (last hour, 100 lines, backward).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LokiRangeParams {
    pub query: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

impl LokiRangeParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("query", self.query.clone())];
        if let Some(start) = non_empty(&self.start) {
            pairs.push(("start", start));
        }
        if let Some(end) = non_empty(&self.end) {
            pairs.push(("end", end));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(step) = non_empty(&self.step) {
            pairs.push(("step", step));
        }
        if let Some(direction) = non_empty(&self.direction) {
            pairs.push(("direction", direction));
        }
        pairs
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Label names are interpolated into the URL path, so only the characters
/// Loki and Prometheus accept in a label name are allowed.
pub(crate) fn validate_label_name(label: &str) -> Result<()> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !label.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid label name: {}", label)))
    }
}

#[derive(Debug, Clone)]
pub struct LokiClient {
    base_url: String,
    tenant_id: Option<String>,
    client: Client,
}

impl LokiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: trim_base(base_url),
            tenant_id: None,
            client: build_http_client(timeout)?,
        })
    }

    /// Set the tenant sent as `X-Scope-OrgID`
    pub fn with_tenant_id(mut self, tenant_id: String) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/loki/api/v1/{}", self.base_url, path);
        let request = self.client.get(url);
        match &self.tenant_id {
            Some(tenant) => request.header("X-Scope-OrgID", tenant),
            None => request,
        }
    }

    /// Run a LogQL range query and reshape the result.
    pub async fn query_range(&self, params: &LokiRangeParams) -> Result<Vec<ResultItem>> {
        info!(logql = %params.query, "LogQL request");

        let response: ApiResponse<QueryData> =
            send_json(self.get("query_range").query(&params.to_pairs())).await?;

        Ok(format::reshape(response.data))
    }

    /// List every label name known to Loki.
    pub async fn labels(&self) -> Result<Vec<String>> {
        let response: ApiResponse<Vec<String>> = send_json(self.get("labels")).await?;
        debug!("Loki returned {} labels", response.data.len());
        Ok(response.data)
    }

    /// List the values a label takes.
    pub async fn label_values(&self, label: &str) -> Result<Vec<String>> {
        validate_label_name(label)?;
        let response: ApiResponse<Vec<String>> =
            send_json(self.get(&format!("label/{}/values", label))).await?;
        Ok(response.data)
    }

    /// List the streams matching a label selector.
    pub async fn series(&self, selector: &str) -> Result<Vec<BTreeMap<String, String>>> {
        info!(selector = %selector, "Loki series request");
        let response: ApiResponse<Vec<BTreeMap<String, String>>> =
            send_json(self.get("series").query(&[("match[]", selector)])).await?;
        Ok(response.data)
    }
}
