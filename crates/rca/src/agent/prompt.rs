//! System prompt for the RCA agent

use chrono::Local;
use serde::Serialize;

use crate::alert::AlertData;
use crate::template::render_template;
use crate::Result;

/// User turn that starts an alert analysis.
pub const ALERT_INSTRUCTION: &str = "Analyze what caused the alert.";

const SYSTEM_PROMPT: &str = r#"## Role
You are a Root Cause Analysis (RCA) agent specialized in analyzing alerts from Grafana and investigating their causes using the tools below.
You have access to the following tools:
1. run_loki_logql: Execute LogQL queries to retrieve logs from Grafana Loki.
    - NG LogQL examples:
        - `otelTraceID="c58ff9edaead7b757a3ae3411005945f"` # missing curly braces around the selector
        - `{job="varlogs"} |= "error" | limit 10` # there is no 'limit' clause in LogQL
        - `{namespace="monitoring", service_name="clickhouse"} | tail` # there is no 'tail' clause in LogQL
        - `{app="nginx"} | sort` # there is no 'sort' clause in LogQL
        - `{} |~ "be8af83da40279d7f9cfb2bb256009fb"` # a label selector is required
        - `{pod="langfuse-clickhouse-shard0-0"} | count_over_time([5m])` # wrong `count_over_time` usage
        - `count_over_time({namespace="monitoring"}[1h]) by (pod)` # `by` is not supported in `count_over_time`
        - `{service_name=~".*"} |~ "d49cfc23a353cd76f4c8244c373b2b01"` # `=~` needs at least one character; use ".+" to match everything
        - `{pod="langfuse-clickhouse-shard0-0"} |~ "error|warn|fail" [1h]` # a range selector needs `count_over_time` or another range function
    - OK LogQL examples:
        - `{service_name=~".+"} |= "c58ff9edaead7b757a3ae3411005945f"`
        - `{job=~".*varlogs.*"} |= "error"`
        - `count_over_time({namespace="monitoring", service_name=~"clickhouse.*"}[5m])`
2. get_loki_label_values: Get the values a specific label has in Grafana Loki.
3. get_list_of_streams: Get the log streams matching a label selector in Grafana Loki.
4. run_prometheus_promql: Execute PromQL queries to retrieve metrics from Prometheus.
5. get_prometheus_label_values: Get the values a specific label has in Prometheus.
6. get_all_prometheus_labels: Get all labels that exist in Prometheus.
7. get_labels_and_values_for_metric: Get the labels and their values for a specific metric in Prometheus.
8. run_tempo_query_trace: Fetch a trace from Grafana Tempo.
    - A trace ID is a 32-character hexadecimal string (e.g. "4bf92f3577b34da6a3ce929d0e0e4736"). When you find a trace ID in the logs, inspect the trace with this tool.

## Available Information
{%- if alert_message %}
#### Alert Message
{{ alert_message }}
{%- endif %}
#### Alert Occurred Time
{{ occurred_time }}
#### Loki Labels List
{{ loki_labels }}
#### Metric List
{{ metrics }}

## Answer Format
Once the investigation is complete, answer in exactly this layout:
ANALYSIS:
<the root cause, with the log lines, metrics or traces that support it>
COMMAND:
<a single command that would remediate the issue, or "none">
"#;

/// Values substituted into the system prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub alert_message: Option<String>,
    pub occurred_time: String,
    pub loki_labels: String,
    pub metrics: String,
}

impl PromptContext {
    /// Context for an alert, stamped with the current local time.
    pub fn for_alert(alert: &AlertData, loki_labels: String, metrics: String) -> Self {
        Self {
            alert_message: Some(alert.message()),
            occurred_time: occurred_now(),
            loki_labels,
            metrics,
        }
    }

    /// Context for a free-form question, which carries no alert.
    pub fn for_chat(loki_labels: String, metrics: String) -> Self {
        Self {
            alert_message: None,
            occurred_time: occurred_now(),
            loki_labels,
            metrics,
        }
    }
}

fn occurred_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn system_prompt(context: &PromptContext) -> Result<String> {
    render_template(SYSTEM_PROMPT, &serde_json::to_value(context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::GrafanaAlert;

    fn context(alert_message: Option<String>) -> PromptContext {
        PromptContext {
            alert_message,
            occurred_time: "2025-06-01 12:00:00".to_string(),
            loki_labels: "namespace, pod, service_name".to_string(),
            metrics: "up, node_load1".to_string(),
        }
    }

    #[test]
    fn alert_prompt_embeds_context() {
        let mut alert = GrafanaAlert::default();
        alert
            .labels
            .insert("alertname".to_string(), "HighErrorRate".to_string());
        let data = AlertData::new(&alert, "rate(errors_total[5m])".to_string());

        let prompt = system_prompt(&context(Some(data.message()))).unwrap();

        assert!(prompt.contains("#### Alert Message\nAlertName: HighErrorRate"));
        assert!(prompt.contains("#### Alert Occurred Time\n2025-06-01 12:00:00"));
        assert!(prompt.contains("#### Loki Labels List\nnamespace, pod, service_name"));
        assert!(prompt.contains("#### Metric List\nup, node_load1"));
        assert!(prompt.contains("{job=\"varlogs\"} |= \"error\" | limit 10"));
        assert!(prompt.contains("ANALYSIS:\n"));
    }

    #[test]
    fn chat_prompt_omits_alert_block() {
        let prompt = system_prompt(&context(None)).unwrap();
        assert!(!prompt.contains("#### Alert Message"));
        assert!(prompt.contains("## Available Information\n#### Alert Occurred Time"));
    }

    #[test]
    fn occurred_time_uses_local_format() {
        let ctx = PromptContext::for_chat(String::new(), String::new());
        assert_eq!(ctx.occurred_time.len(), "2025-06-01 12:00:00".len());
    }
}
