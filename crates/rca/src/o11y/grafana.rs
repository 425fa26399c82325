//! Grafana alert rule lookup
//!
//! Grafana-managed alerts only carry a `generatorURL`; the query that fired
//! has to be fetched from the provisioning API using the rule UID embedded
//! in that URL.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{build_http_client, trim_base};
use crate::config::GrafanaConfig;
use crate::{Error, Result};

/// Returned for alerts sent by Grafana's "test contact point" button.
pub const TEST_ALERT_SENTINEL: &str = "Test Alert from Contact Point";

const RULE_PATH_MARKER: &str = "alerting/grafana";

#[derive(Debug, Deserialize)]
struct AlertRule {
    #[serde(default)]
    data: Vec<RuleQuery>,
}

#[derive(Debug, Deserialize)]
struct RuleQuery {
    #[serde(default)]
    model: RuleModel,
}

#[derive(Debug, Default, Deserialize)]
struct RuleModel {
    expr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GrafanaClient {
    base_url: Option<String>,
    api_key: Option<String>,
    client: Client,
}

impl GrafanaClient {
    pub fn new(config: &GrafanaConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.url.as_deref().map(trim_base),
            api_key: config.api_key.clone(),
            client: build_http_client(Duration::from_secs(config.timeout_seconds))?,
        })
    }

    /// Base URL for the provisioning API: the configured one, or whatever
    /// precedes the rule path in the generator URL.
    fn base_for(&self, generator_url: &str) -> String {
        match &self.base_url {
            Some(base) => base.clone(),
            None => {
                let prefix = generator_url
                    .split(RULE_PATH_MARKER)
                    .next()
                    .unwrap_or_default();
                trim_base(prefix)
            }
        }
    }

    /// Resolve the query expressions behind an alert.
    ///
    /// Returns [`TEST_ALERT_SENTINEL`] without touching the network when
    /// the URL does not point at a Grafana-managed rule.
    pub async fn get_query_in_alert(&self, generator_url: &str) -> Result<String> {
        if !generator_url.contains(RULE_PATH_MARKER) {
            info!("{}", TEST_ALERT_SENTINEL);
            return Ok(TEST_ALERT_SENTINEL.to_string());
        }

        let uid = rule_uid(generator_url)?;
        let url = format!(
            "{}/api/v1/provisioning/alert-rules/{}",
            self.base_for(generator_url),
            uid
        );

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;

        if body.is_empty() {
            warn!("Empty response from Grafana API");
            return Ok(String::new());
        }

        let rule: AlertRule = match serde_json::from_str(&body) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Failed to parse JSON response: {}", e);
                return Ok(String::new());
            }
        };

        let queries: Vec<String> = rule
            .data
            .into_iter()
            .filter_map(|query| query.model.expr)
            .collect();

        Ok(queries.join(", "))
    }
}

/// The rule UID is the second-to-last path segment, e.g.
/// `.../alerting/grafana/<uid>/view`.
fn rule_uid(generator_url: &str) -> Result<&str> {
    let segments: Vec<&str> = generator_url.split('/').collect();
    if segments.len() < 2 {
        return Err(Error::Validation(format!(
            "Invalid generatorURL format: {}",
            generator_url
        )));
    }
    Ok(segments[segments.len() - 2])
}
