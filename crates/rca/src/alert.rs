//! Grafana alert payloads
//!
//! The webhook body sent by a Grafana contact point, and the reduced
//! [`AlertData`] record an analysis works from.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::o11y::GrafanaClient;
use crate::Result;

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrafanaWebhook {
    #[serde(default, deserialize_with = "null_as_default")]
    pub receiver: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Kept undecoded so that one malformed alert does not reject the batch.
    #[serde(default, deserialize_with = "null_as_default")]
    pub alerts: Vec<Value>,
    #[serde(rename = "groupLabels", default, deserialize_with = "null_as_default")]
    pub group_labels: BTreeMap<String, String>,
    #[serde(rename = "commonLabels", default, deserialize_with = "null_as_default")]
    pub common_labels: BTreeMap<String, String>,
    #[serde(rename = "externalURL", default, deserialize_with = "null_as_default")]
    pub external_url: String,
}

impl GrafanaWebhook {
    /// Decode each alert on its own.
    pub fn decode_alerts(&self) -> impl Iterator<Item = serde_json::Result<GrafanaAlert>> + '_ {
        self.alerts.iter().map(GrafanaAlert::deserialize)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GrafanaAlert {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "generatorURL", default, deserialize_with = "null_as_default")]
    pub generator_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fingerprint: String,
}

impl GrafanaAlert {
    pub fn alert_name(&self) -> &str {
        self.labels
            .get("alertname")
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

/// What the agent is told about an alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertData {
    pub status: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub query: String,
    pub log_message: String,
}

impl AlertData {
    /// Build from a raw alert and the query expressions behind its rule.
    pub fn new(alert: &GrafanaAlert, query: String) -> Self {
        Self {
            status: alert.status.clone().unwrap_or_else(|| "unknown".to_string()),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            query,
            log_message: alert
                .labels
                .get("message")
                .cloned()
                .unwrap_or_else(|| "N/A".to_string()),
        }
    }

    /// Resolve the alert's query through Grafana.
    pub async fn extract(alert: &GrafanaAlert, grafana: &GrafanaClient) -> Result<Self> {
        let query = grafana.get_query_in_alert(&alert.generator_url).await?;
        Ok(Self::new(alert, query))
    }

    pub fn alert_name(&self) -> &str {
        self.labels
            .get("alertname")
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// The alert block embedded in the system prompt.
    pub fn message(&self) -> String {
        format!(
            "AlertName: {}\nLabels: {}\nAnnotations: {}\nQuery: {}\nLog Message: {}",
            self.alert_name(),
            format_map(&self.labels),
            format_map(&self.annotations),
            self.query,
            self.log_message
        )
    }
}

fn format_map(map: &BTreeMap<String, String>) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "'{}': '{}'", key, value);
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert() -> GrafanaAlert {
        serde_json::from_value(json!({
            "status": "firing",
            "labels": {"alertname": "HighErrorRate", "message": "upstream timed out"},
            "annotations": {"summary": "5xx above 5%"},
            "generatorURL": "http://grafana:3000/alerting/grafana/abc123/view"
        }))
        .unwrap()
    }

    #[test]
    fn webhook_defaults_missing_fields() {
        let webhook: GrafanaWebhook = serde_json::from_value(json!({"alerts": [{}]})).unwrap();
        let alerts: Vec<_> = webhook.decode_alerts().collect::<serde_json::Result<_>>().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_name(), "unknown");

        let data = AlertData::new(&alerts[0], String::new());
        assert_eq!(data.status, "unknown");
        assert_eq!(data.log_message, "N/A");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let alert: GrafanaAlert = serde_json::from_value(json!({
            "status": null,
            "labels": {"alertname": "DiskFull"},
            "annotations": null,
            "generatorURL": null
        }))
        .unwrap();
        assert_eq!(alert.alert_name(), "DiskFull");
        assert!(alert.annotations.is_empty());
        assert_eq!(alert.generator_url, "");
    }

    #[test]
    fn malformed_alert_does_not_spoil_the_batch() {
        let webhook: GrafanaWebhook = serde_json::from_value(json!({
            "receiver": null,
            "alerts": [
                {"labels": {"alertname": "Broken", "severity": 3}},
                {"labels": {"alertname": "DiskFull"}, "generatorURL": "http://g/alerting/list"}
            ]
        }))
        .unwrap();

        let decoded: Vec<_> = webhook.decode_alerts().collect();
        assert!(decoded[0].is_err());
        assert_eq!(decoded[1].as_ref().unwrap().alert_name(), "DiskFull");
    }

    #[test]
    fn message_lists_alert_fields() {
        let data = AlertData::new(&alert(), "rate(http_requests_total{code=~\"5..\"}[5m])".to_string());
        assert_eq!(
            data.message(),
            "AlertName: HighErrorRate\n\
             Labels: {'alertname': 'HighErrorRate', 'message': 'upstream timed out'}\n\
             Annotations: {'summary': '5xx above 5%'}\n\
             Query: rate(http_requests_total{code=~\"5..\"}[5m])\n\
             Log Message: upstream timed out"
        );
    }
}
