//! Prometheus tools

use rig::completion::ToolDefinition;
use rig::tool::Tool as RigTool;
use serde_json::json;
use tracing::{error, info};

use super::{
    join_names, spawn_tool, string_param, to_json, LabelArgs, MetricArgs, NoArgs, QueryArgs,
    ToolError,
};
use crate::metrics::record_tool_call;
use crate::o11y::prometheus::metric_series_rows;
use crate::o11y::{PrometheusClient, PrometheusRangeParams};

pub async fn run_prometheus_promql(prometheus: &PrometheusClient, query: &str) -> String {
    match prometheus.query_range(&PrometheusRangeParams::new(query)).await {
        Ok(items) => {
            record_tool_call(PromqlTool::NAME, true);
            info!(promql = %query, "PromQL executed");
            format!("#### PromQL\n`{}`\n\n#### Result\n{}", query, to_json(&items))
        }
        Err(e) => {
            record_tool_call(PromqlTool::NAME, false);
            error!("Failed to execute PromQL. Error: {:?}", e);
            format!("Failed to execute PromQL: {}. Error: {:?}", query, e)
        }
    }
}

pub async fn get_prometheus_label_values(prometheus: &PrometheusClient, label: &str) -> String {
    match prometheus.label_values(label).await {
        Ok(values) => {
            record_tool_call(PrometheusLabelValuesTool::NAME, true);
            format!(
                "#### Prometheus Label\n`{}`\n\n#### Values of label\n{}",
                label,
                join_names(&values)
            )
        }
        Err(e) => {
            record_tool_call(PrometheusLabelValuesTool::NAME, false);
            let message = format!(
                "Failed to get the values of label[{}] from Prometheus. Error: {:?}",
                label, e
            );
            error!("{}", message);
            message
        }
    }
}

pub async fn get_all_prometheus_labels(prometheus: &PrometheusClient) -> String {
    match prometheus.labels().await {
        Ok(labels) => {
            record_tool_call(PrometheusLabelsTool::NAME, true);
            format!("#### All Labels in Prometheus\n{}", join_names(&labels))
        }
        Err(e) => {
            record_tool_call(PrometheusLabelsTool::NAME, false);
            let message = format!("Failed to get labels from Prometheus. Error: {:?}", e);
            error!("{}", message);
            message
        }
    }
}

pub async fn get_labels_and_values_for_metric(prometheus: &PrometheusClient, metric: &str) -> String {
    match prometheus.series(metric).await {
        Ok(series) => {
            record_tool_call(MetricLabelsTool::NAME, true);
            format!(
                "#### Labels and their values for metric[`{}`]\n{}",
                metric,
                metric_series_rows(series)
            )
        }
        Err(e) => {
            record_tool_call(MetricLabelsTool::NAME, false);
            let message = format!(
                "Failed to get the labels and their values of metric[{}] from Prometheus. Error: {:?}",
                metric, e
            );
            error!("{}", message);
            message
        }
    }
}

/// Every metric name, joined for the system prompt.
pub async fn get_all_metrics(prometheus: &PrometheusClient) -> String {
    match prometheus.all_metrics().await {
        Ok(metrics) => join_names(&metrics),
        Err(e) => {
            let message = format!("Failed to get metrics from Prometheus. Error: {:?}", e);
            error!("{}", message);
            message
        }
    }
}

#[derive(Clone)]
pub struct PromqlTool {
    prometheus: PrometheusClient,
}

impl PromqlTool {
    pub fn new(prometheus: PrometheusClient) -> Self {
        Self { prometheus }
    }
}

impl RigTool for PromqlTool {
    const NAME: &'static str = "run_prometheus_promql";

    type Error = ToolError;
    type Args = QueryArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Execute a PromQL range query against Prometheus over the last hour \
                          at a 10 minute step."
                .to_string(),
            parameters: string_param("query", "The PromQL query to execute against Prometheus."),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let prometheus = self.prometheus.clone();
        Ok(spawn_tool(async move { run_prometheus_promql(&prometheus, &args.query).await }).await?)
    }
}

#[derive(Clone)]
pub struct PrometheusLabelValuesTool {
    prometheus: PrometheusClient,
}

impl PrometheusLabelValuesTool {
    pub fn new(prometheus: PrometheusClient) -> Self {
        Self { prometheus }
    }
}

impl RigTool for PrometheusLabelValuesTool {
    const NAME: &'static str = "get_prometheus_label_values";

    type Error = ToolError;
    type Args = LabelArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get the values that a specific label has in Prometheus.".to_string(),
            parameters: string_param("label", "A label in Prometheus for checking its values."),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let prometheus = self.prometheus.clone();
        Ok(spawn_tool(async move { get_prometheus_label_values(&prometheus, &args.label).await })
            .await?)
    }
}

#[derive(Clone)]
pub struct PrometheusLabelsTool {
    prometheus: PrometheusClient,
}

impl PrometheusLabelsTool {
    pub fn new(prometheus: PrometheusClient) -> Self {
        Self { prometheus }
    }
}

impl RigTool for PrometheusLabelsTool {
    const NAME: &'static str = "get_all_prometheus_labels";

    type Error = ToolError;
    type Args = NoArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get all labels that exist in Prometheus.".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        let prometheus = self.prometheus.clone();
        Ok(spawn_tool(async move { get_all_prometheus_labels(&prometheus).await }).await?)
    }
}

#[derive(Clone)]
pub struct MetricLabelsTool {
    prometheus: PrometheusClient,
}

impl MetricLabelsTool {
    pub fn new(prometheus: PrometheusClient) -> Self {
        Self { prometheus }
    }
}

impl RigTool for MetricLabelsTool {
    const NAME: &'static str = "get_labels_and_values_for_metric";

    type Error = ToolError;
    type Args = MetricArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get the labels and their values for a specific metric from Prometheus."
                .to_string(),
            parameters: string_param(
                "metric",
                "The metric name without any label selectors \
                 (OK: 'cpu_usage', NG: 'cpu_usage{instance=\"server1\"}').",
            ),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let prometheus = self.prometheus.clone();
        Ok(spawn_tool(async move {
            get_labels_and_values_for_metric(&prometheus, &args.metric).await
        })
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::o11y::{METRIC_NOT_FOUND, NO_DATA_FOUND};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> PrometheusClient {
        PrometheusClient::new(uri, Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn empty_matrix_reports_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query_range"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"resultType": "matrix", "result": []}
            })))
            .mount(&server)
            .await;

        let output = run_prometheus_promql(&client(&server.uri()), "up").await;
        assert!(output.starts_with("#### PromQL\n`up`\n\n#### Result\n"));
        assert!(output.contains(NO_DATA_FOUND));
    }

    #[tokio::test]
    async fn unknown_metric_reports_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": []
            })))
            .mount(&server)
            .await;

        let output = get_labels_and_values_for_metric(&client(&server.uri()), "missing_total").await;
        assert!(output.starts_with("#### Labels and their values for metric[`missing_total`]"));
        assert!(output.contains(METRIC_NOT_FOUND));
    }

    #[tokio::test]
    async fn connection_failures_are_reported_as_text() {
        let prometheus = client("http://127.0.0.1:1");

        assert!(run_prometheus_promql(&prometheus, "up")
            .await
            .starts_with("Failed to execute PromQL: up. Error: "));
        assert!(get_prometheus_label_values(&prometheus, "job")
            .await
            .starts_with("Failed to get the values of label[job] from Prometheus"));
        assert!(get_all_prometheus_labels(&prometheus)
            .await
            .starts_with("Failed to get labels from Prometheus"));
        assert!(get_labels_and_values_for_metric(&prometheus, "up")
            .await
            .contains("Failed to"));
        assert!(get_all_metrics(&prometheus)
            .await
            .starts_with("Failed to get metrics from Prometheus"));
    }

    #[tokio::test]
    async fn all_labels_are_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": ["__name__", "instance", "job"]
            })))
            .mount(&server)
            .await;

        let output = get_all_prometheus_labels(&client(&server.uri())).await;
        assert_eq!(output, "#### All Labels in Prometheus\n__name__, instance, job");
    }
}
