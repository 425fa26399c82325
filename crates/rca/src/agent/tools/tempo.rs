//! Tempo tool

use rig::completion::ToolDefinition;
use rig::tool::Tool as RigTool;
use tracing::error;

use super::{spawn_tool, string_param, to_json, ToolError, TraceArgs};
use crate::metrics::record_tool_call;
use crate::o11y::TempoClient;

pub async fn run_tempo_query_trace(tempo: &TempoClient, trace_id: &str) -> String {
    match tempo.query_trace(trace_id).await {
        Ok(trace) => {
            record_tool_call(TempoTraceTool::NAME, true);
            format!("#### TraceID\n`{}`\n\n#### Result\n{}", trace_id, to_json(&trace))
        }
        Err(e) => {
            record_tool_call(TempoTraceTool::NAME, false);
            let message = format!("Failed to execute trace query. Error: {:?}", e);
            error!("{}", message);
            message
        }
    }
}

#[derive(Clone)]
pub struct TempoTraceTool {
    tempo: TempoClient,
}

impl TempoTraceTool {
    pub fn new(tempo: TempoClient) -> Self {
        Self { tempo }
    }
}

impl RigTool for TempoTraceTool {
    const NAME: &'static str = "run_tempo_query_trace";

    type Error = ToolError;
    type Args = TraceArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Fetch a trace by its ID from Grafana Tempo. A trace ID is a \
                          32-character hexadecimal string, e.g. 4bf92f3577b34da6a3ce929d0e0e4736."
                .to_string(),
            parameters: string_param("trace_id", "The trace ID to look up in Grafana Tempo."),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let tempo = self.tempo.clone();
        Ok(spawn_tool(async move { run_tempo_query_trace(&tempo, &args.trace_id).await }).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::o11y::TRACE_NOT_FOUND;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TRACE_ID: &str = "98100898d812021273ec14bd273e4dda";

    #[tokio::test]
    async fn missing_trace_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let tempo = TempoClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let output = run_tempo_query_trace(&tempo, TRACE_ID).await;
        assert!(output.starts_with(&format!("#### TraceID\n`{}`", TRACE_ID)));
        assert!(output.contains(TRACE_NOT_FOUND));
    }

    #[tokio::test]
    async fn connection_failure_is_reported_as_text() {
        let tempo = TempoClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let output = run_tempo_query_trace(&tempo, TRACE_ID).await;
        assert!(output.starts_with("Failed to execute trace query. Error: "));
    }
}
