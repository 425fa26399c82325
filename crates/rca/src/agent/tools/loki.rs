//! Loki tools

use rig::completion::ToolDefinition;
use rig::tool::Tool as RigTool;
use tracing::{error, info};

use super::{
    join_names, spawn_tool, string_param, to_json, LabelArgs, QueryArgs, SelectorArgs, ToolError,
};
use crate::metrics::record_tool_call;
use crate::o11y::{LokiClient, LokiRangeParams};

/// Run a LogQL query and format the reshaped result.
pub async fn run_loki_logql(loki: &LokiClient, query: &str) -> String {
    match loki.query_range(&LokiRangeParams::new(query)).await {
        Ok(items) => {
            record_tool_call(LokiLogqlTool::NAME, true);
            info!(logql = %query, "LogQL executed");
            format!("#### LogQL\n`{}`\n\n#### Result\n{}", query, to_json(&items))
        }
        Err(e) => {
            record_tool_call(LokiLogqlTool::NAME, false);
            error!("Failed to execute LogQL. Error: {:?}", e);
            format!("Failed to execute LogQL: {}. Error: {:?}", query, e)
        }
    }
}

pub async fn get_loki_label_values(loki: &LokiClient, label: &str) -> String {
    match loki.label_values(label).await {
        Ok(values) => {
            record_tool_call(LokiLabelValuesTool::NAME, true);
            format!(
                "#### Loki Label\n`{}`\n\n#### Values of label\n{}",
                label,
                join_names(&values)
            )
        }
        Err(e) => {
            record_tool_call(LokiLabelValuesTool::NAME, false);
            let message = format!(
                "Failed to get the values of label[{}] from Loki. Error: {:?}",
                label, e
            );
            error!("{}", message);
            message
        }
    }
}

pub async fn get_list_of_streams(loki: &LokiClient, selector: &str) -> String {
    match loki.series(selector).await {
        Ok(streams) => {
            record_tool_call(LokiStreamsTool::NAME, true);
            let streams = if streams.is_empty() {
                to_json(&[crate::o11y::ResultItem::no_data()])
            } else {
                to_json(&streams)
            };
            format!(
                "#### Label Selector\n`{}`\n\n#### Streams\n{}",
                selector, streams
            )
        }
        Err(e) => {
            record_tool_call(LokiStreamsTool::NAME, false);
            let message = format!(
                "Failed to get the streams of label selector [{}] from Loki. Error: {:?}",
                selector, e
            );
            error!("{}", message);
            message
        }
    }
}

/// Every Loki label, joined for the system prompt.
pub async fn get_all_loki_labels(loki: &LokiClient) -> String {
    match loki.labels().await {
        Ok(labels) => {
            let joined = join_names(&labels);
            info!("List of labels: {}", joined);
            joined
        }
        Err(e) => {
            let message = format!("Failed to get labels from Loki. Error: {:?}", e);
            error!("{}", message);
            message
        }
    }
}

#[derive(Clone)]
pub struct LokiLogqlTool {
    loki: LokiClient,
}

impl LokiLogqlTool {
    pub fn new(loki: LokiClient) -> Self {
        Self { loki }
    }
}

impl RigTool for LokiLogqlTool {
    const NAME: &'static str = "run_loki_logql";

    type Error = ToolError;
    type Args = QueryArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Execute a LogQL query against Grafana Loki. Logs from the last hour \
                          are searched. LogQL has no `limit`, `sort` or `tail` clause. \
                          Valid: {service_name=\"alloy\"}, {pod=\"alloy-shdq6\"} |~ \"warn\", \
                          count_over_time({pod=\"alloy-shdq6\"} |~ \"warn\"[5m]). \
                          Invalid: {service_name=\"alloy\"} | limit 10."
                .to_string(),
            parameters: string_param("query", "The LogQL query to execute against Grafana Loki."),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let loki = self.loki.clone();
        Ok(spawn_tool(async move { run_loki_logql(&loki, &args.query).await }).await?)
    }
}

#[derive(Clone)]
pub struct LokiLabelValuesTool {
    loki: LokiClient,
}

impl LokiLabelValuesTool {
    pub fn new(loki: LokiClient) -> Self {
        Self { loki }
    }
}

impl RigTool for LokiLabelValuesTool {
    const NAME: &'static str = "get_loki_label_values";

    type Error = ToolError;
    type Args = LabelArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get the values that a specific label has in Grafana Loki.".to_string(),
            parameters: string_param("label", "A label in Loki for checking its values."),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let loki = self.loki.clone();
        Ok(spawn_tool(async move { get_loki_label_values(&loki, &args.label).await }).await?)
    }
}

#[derive(Clone)]
pub struct LokiStreamsTool {
    loki: LokiClient,
}

impl LokiStreamsTool {
    pub fn new(loki: LokiClient) -> Self {
        Self { loki }
    }
}

impl RigTool for LokiStreamsTool {
    const NAME: &'static str = "get_list_of_streams";

    type Error = ToolError;
    type Args = SelectorArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Retrieve the log streams matching a label selector from Grafana Loki."
                .to_string(),
            parameters: string_param(
                "selector",
                "The label selector part of a LogQL query, e.g. {namespace=\"monitoring\"}. \
                 Do not include filter operators, parser expressions or line format expressions.",
            ),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let loki = self.loki.clone();
        Ok(spawn_tool(async move { get_list_of_streams(&loki, &args.selector).await }).await?)
    }
}
