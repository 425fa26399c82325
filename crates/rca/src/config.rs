use serde::{Deserialize, Serialize};

use crate::agent::provider::LLMConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub backends: BackendConfig,
    pub grafana: GrafanaConfig,
    pub llm: LLMConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

/// Endpoints of the observability backends queried by the agent tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub loki_url: String,
    /// Sent as `X-Scope-OrgID` when Loki runs multi-tenant.
    pub loki_tenant_id: Option<String>,
    pub prometheus_url: String,
    pub tempo_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrafanaConfig {
    /// When unset the base URL is derived from each alert's generator URL.
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    #[serde(skip_serializing)]
    pub signing_secret: Option<String>,
    /// Channel that receives reports for webhook alerts.
    pub channel: Option<String>,
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            signing_secret: None,
            channel: None,
            api_base: "https://slack.com/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "text")]
    Text,
}

impl Default for ReportFormat {
    fn default() -> Self {
        ReportFormat::Text
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Read configuration from the environment. Callers apply their
    /// overrides and then call [`Config::validate`].
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                addr: env_or("SERVER_ADDR", &defaults.server.addr),
            },
            backends: BackendConfig {
                loki_url: env_or("LOKI_URL", &defaults.backends.loki_url),
                loki_tenant_id: env_opt("LOKI_TENANT_ID"),
                prometheus_url: env_or("PROMETHEUS_URL", &defaults.backends.prometheus_url),
                tempo_url: env_or("TEMPO_URL", &defaults.backends.tempo_url),
                timeout_seconds: env_parse("O11Y_TIMEOUT_SECONDS", defaults.backends.timeout_seconds),
            },
            grafana: GrafanaConfig {
                url: env_opt("GRAFANA_URL"),
                api_key: env_opt("GRAFANA_API_KEY"),
                timeout_seconds: env_parse("GRAFANA_TIMEOUT_SECONDS", defaults.grafana.timeout_seconds),
            },
            llm: LLMConfig {
                provider: env_or("LLM_PROVIDER", &defaults.llm.provider).to_lowercase(),
                model: env_or("LLM_MODEL", &defaults.llm.model),
                api_key: env_opt("LLM_API_KEY"),
                temperature: env_parse("LLM_TEMPERATURE", defaults.llm.temperature),
                max_tokens: env_parse("LLM_MAX_TOKENS", defaults.llm.max_tokens),
                max_turns: env_parse("AGENT_MAX_TURNS", defaults.llm.max_turns),
            },
            slack: SlackConfig {
                bot_token: env_opt("SLACK_BOT_TOKEN"),
                signing_secret: env_opt("SLACK_SIGNING_SECRET"),
                channel: env_opt("SLACK_CHANNEL"),
                api_base: env_or("SLACK_API_BASE", &defaults.slack.api_base),
            },
            report: ReportConfig {
                format: match env_or("REPORT_FORMAT", "text").to_lowercase().as_str() {
                    "json" => ReportFormat::Json,
                    _ => ReportFormat::Text,
                },
                pretty: env_parse("REPORT_PRETTY", false),
            },
            dispatch: DispatchConfig {
                queue_capacity: env_parse("ANALYSIS_QUEUE_CAPACITY", defaults.dispatch.queue_capacity),
            },
        };

        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        match self.llm.provider.as_str() {
            "anthropic" | "claude" | "openai" => {
                if self.llm.api_key.is_none() {
                    tracing::warn!(
                        "LLM_API_KEY is not set. Falling back to the provider's own environment variable."
                    );
                }
            }
            "mock" => {}
            other => {
                return Err(crate::Error::Config(format!(
                    "Unsupported LLM provider: {}",
                    other
                )));
            }
        }

        if self.llm.max_turns == 0 {
            return Err(crate::Error::Config(
                "AGENT_MAX_TURNS must be greater than zero".to_string(),
            ));
        }

        if self.dispatch.queue_capacity == 0 {
            return Err(crate::Error::Config(
                "ANALYSIS_QUEUE_CAPACITY must be greater than zero".to_string(),
            ));
        }

        if self.slack.channel.is_some() && self.slack.bot_token.is_none() {
            tracing::warn!("SLACK_CHANNEL is set but SLACK_BOT_TOKEN is not. Reports will not reach Slack.");
        }

        if self.grafana.api_key.is_none() {
            tracing::warn!("GRAFANA_API_KEY is not set. Alert rule lookups may be rejected.");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8089".to_string(),
            },
            backends: BackendConfig {
                loki_url: "http://loki:3100".to_string(),
                loki_tenant_id: None,
                prometheus_url: "http://prometheus:9090".to_string(),
                tempo_url: "http://tempo:3200".to_string(),
                timeout_seconds: 10,
            },
            grafana: GrafanaConfig {
                url: None,
                api_key: None,
                timeout_seconds: 5,
            },
            llm: LLMConfig::default(),
            slack: SlackConfig::default(),
            report: ReportConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let mut config = Config::default();
        config.llm.provider = "mock".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.backends.timeout_seconds, 10);
        assert_eq!(config.grafana.timeout_seconds, 5);
    }

    #[test]
    fn rejects_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = "vertex".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported LLM provider"));
    }

    #[test]
    fn load_leaves_validation_to_the_caller() {
        std::env::set_var("LLM_PROVIDER", "Vertex");
        let loaded = Config::load();
        std::env::remove_var("LLM_PROVIDER");

        let mut config = loaded.unwrap();
        assert_eq!(config.llm.provider, "vertex");
        assert!(config.validate().is_err());

        config.llm.provider = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_turns() {
        let mut config = Config::default();
        config.llm.provider = "mock".to_string();
        config.llm.max_turns = 0;
        assert!(config.validate().is_err());
    }
}
