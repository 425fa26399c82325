//! Agent Runtime
//!
//! Runs one root cause analysis: gathers prompt context from the backends,
//! hands the prompt and the query tools to a Rig agent, and parses the
//! final reply. The tool-calling loop itself belongs to Rig.

use anyhow::{anyhow, Result};
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};
use tracing::{debug, info};

use super::prompt::{system_prompt, PromptContext, ALERT_INSTRUCTION};
use super::provider::{anthropic_model_id, create_provider, LLMConfig, LLMProviderType};
use super::result::{parse_report, RcaReport};
use super::tools::{
    loki::get_all_loki_labels, prometheus::get_all_metrics, LokiLabelValuesTool, LokiLogqlTool,
    LokiStreamsTool, MetricLabelsTool, PrometheusLabelValuesTool, PrometheusLabelsTool,
    PromqlTool, TempoTraceTool,
};
use crate::alert::AlertData;
use crate::o11y::O11yClients;

/// Alert name recorded on reports for free-form chat requests.
pub const CHAT_REPORT_NAME: &str = "chat";

#[derive(Clone)]
pub struct RcaAgent {
    llm_config: LLMConfig,
    provider: LLMProviderType,
    clients: O11yClients,
}

impl RcaAgent {
    pub fn new(llm_config: LLMConfig, clients: O11yClients) -> Result<Self> {
        let provider = create_provider(&llm_config)?;
        info!(provider = ?provider, model = %llm_config.model, "RCA agent ready");

        Ok(Self {
            llm_config,
            provider,
            clients,
        })
    }

    /// Investigate a Grafana alert.
    pub async fn analyze_alert(&self, alert: &AlertData) -> Result<RcaReport> {
        info!(alert_name = %alert.alert_name(), "Starting alert cause analysis");

        let (loki_labels, metrics) = self.prompt_lists().await;
        let context = PromptContext::for_alert(alert, loki_labels, metrics);
        let preamble = system_prompt(&context)?;

        let response = self.run(&preamble, ALERT_INSTRUCTION).await?;
        debug!("Agent response: {}", response);

        Ok(parse_report(alert.alert_name(), &response))
    }

    /// Answer a free-form request, e.g. a chat mention.
    pub async fn analyze_text(&self, text: &str) -> Result<RcaReport> {
        info!("Starting chat analysis");

        let (loki_labels, metrics) = self.prompt_lists().await;
        let context = PromptContext::for_chat(loki_labels, metrics);
        let preamble = system_prompt(&context)?;

        let response = self.run(&preamble, text).await?;
        debug!("Agent response: {}", response);

        Ok(parse_report(CHAT_REPORT_NAME, &response))
    }

    async fn prompt_lists(&self) -> (String, String) {
        tokio::join!(
            get_all_loki_labels(&self.clients.loki),
            get_all_metrics(&self.clients.prometheus)
        )
    }

    fn with_tools<M: CompletionModel>(&self, builder: AgentBuilder<M>) -> AgentBuilder<M> {
        let clients = &self.clients;
        builder
            .tool(LokiLogqlTool::new(clients.loki.clone()))
            .tool(LokiLabelValuesTool::new(clients.loki.clone()))
            .tool(LokiStreamsTool::new(clients.loki.clone()))
            .tool(PromqlTool::new(clients.prometheus.clone()))
            .tool(PrometheusLabelValuesTool::new(clients.prometheus.clone()))
            .tool(PrometheusLabelsTool::new(clients.prometheus.clone()))
            .tool(MetricLabelsTool::new(clients.prometheus.clone()))
            .tool(TempoTraceTool::new(clients.tempo.clone()))
            .max_tokens(self.llm_config.max_tokens)
            .temperature(self.llm_config.temperature)
    }

    async fn run(&self, preamble: &str, message: &str) -> Result<String> {
        let turns = self.llm_config.max_turns;

        match &self.provider {
            LLMProviderType::Anthropic(client) => {
                let model = anthropic_model_id(&self.llm_config.model);
                let agent = self.with_tools(client.agent(model).preamble(preamble)).build();
                agent
                    .prompt(message)
                    .multi_turn(turns)
                    .await
                    .map_err(|e| anyhow!("Anthropic agent failed: {:?}", e))
            }
            LLMProviderType::OpenAI(client) => {
                let agent = self
                    .with_tools(client.agent(&self.llm_config.model).preamble(preamble))
                    .build();
                agent
                    .prompt(message)
                    .multi_turn(turns)
                    .await
                    .map_err(|e| anyhow!("OpenAI agent failed: {:?}", e))
            }
            LLMProviderType::Mock => Ok(mock_response(preamble)),
        }
    }
}

/// Canned reply for the mock provider.
fn mock_response(preamble: &str) -> String {
    if preamble.contains("AlertName: HighErrorRate") {
        "ANALYSIS:\nThe api deployment returns 5xx since its last rollout. \
         Loki shows `connection refused` to postgres:5432 from every api pod, \
         and the postgres pod restarted at the same time.\n\
         COMMAND:\nkubectl rollout restart deployment/api -n production"
            .to_string()
    } else {
        "ANALYSIS:\nNo anomaly found in logs, metrics or traces for the reported issue. \
         Manual investigation required.\n\
         COMMAND:\nnone"
            .to_string()
    }
}
