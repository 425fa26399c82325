//! Agent Tools Module
//!
//! Read-only query tools the RCA agent uses to investigate alerts. Every tool
//! returns a text block for the LLM; backend failures are reported inside
//! that text instead of as errors, so the agent can correct its query and
//! try again.

pub mod loki;
pub mod prometheus;
pub mod tempo;

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::task::JoinHandle;

pub use loki::{LokiLabelValuesTool, LokiLogqlTool, LokiStreamsTool};
pub use prometheus::{
    MetricLabelsTool, PrometheusLabelValuesTool, PrometheusLabelsTool, PromqlTool,
};
pub use tempo::TempoTraceTool;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryArgs {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelArgs {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorArgs {
    pub selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricArgs {
    pub metric: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceArgs {
    pub trace_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoArgs {}

/// Run a tool body on its own task.
///
/// `rig` requires tool futures to be `Sync`, which reqwest futures are not;
/// only the join handle is held across the await.
pub(crate) fn spawn_tool<F>(task: F) -> JoinHandle<String>
where
    F: Future<Output = String> + Send + 'static,
{
    tokio::spawn(task)
}

/// Join a list of names for the prompt, or the placeholder when empty.
pub(crate) fn join_names(names: &[String]) -> String {
    if names.is_empty() {
        crate::o11y::NO_DATA_FOUND.to_string()
    } else {
        names.join(", ")
    }
}

/// Serialize a tool payload for the LLM.
pub(crate) fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable result: {}>", e))
}

fn string_param(name: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            name: {
                "type": "string",
                "description": description
            }
        },
        "required": [name]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_lists_use_placeholder() {
        assert_eq!(join_names(&[]), crate::o11y::NO_DATA_FOUND);
        assert_eq!(
            join_names(&["job".to_string(), "pod".to_string()]),
            "job, pod"
        );
    }

    #[test]
    fn no_args_accepts_empty_object() {
        let args: NoArgs = serde_json::from_str("{}").unwrap();
        let _ = args;
    }

    #[tokio::test]
    async fn spawned_tools_report_output() {
        let output = spawn_tool(async { "done".to_string() }).await.unwrap();
        assert_eq!(output, "done");
    }
}
