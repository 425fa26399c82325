//! LLM Provider Abstraction
//!
//! Resolves the configured provider into a Rig client.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use rig::providers::{anthropic, openai};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Upper bound on tool-calling rounds per analysis.
    pub max_turns: usize,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-5-sonnet".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_turns: 20,
        }
    }
}

/// A ready-to-use LLM client.
#[derive(Clone)]
pub enum LLMProviderType {
    Anthropic(anthropic::Client),
    OpenAI(openai::Client),
    /// Canned responses, used in tests and local runs without credentials.
    Mock,
}

impl std::fmt::Debug for LLMProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LLMProviderType::Anthropic(_) => "Anthropic",
            LLMProviderType::OpenAI(_) => "OpenAI",
            LLMProviderType::Mock => "Mock",
        };
        f.write_str(name)
    }
}

/// Create a provider from configuration
pub fn create_provider(config: &LLMConfig) -> Result<LLMProviderType> {
    match config.provider.as_str() {
        "anthropic" | "claude" => {
            let client = if let Some(key) = &config.api_key {
                anthropic::Client::new(
                    key,
                    "https://api.anthropic.com",
                    None,
                    anthropic::ANTHROPIC_VERSION_LATEST,
                )
            } else {
                // Reads ANTHROPIC_API_KEY
                anthropic::Client::from_env()
            };
            Ok(LLMProviderType::Anthropic(client))
        }
        "openai" => {
            let client = if let Some(key) = &config.api_key {
                openai::Client::new(key)
            } else {
                // Reads OPENAI_API_KEY
                openai::Client::from_env()
            };
            Ok(LLMProviderType::OpenAI(client))
        }
        "mock" => Ok(LLMProviderType::Mock),
        other => Err(anyhow!("Unsupported LLM provider: {}", other)),
    }
}

/// Map short model names to the identifiers the Anthropic API expects.
pub fn anthropic_model_id(model: &str) -> &str {
    match model {
        "claude-3-5-sonnet" => anthropic::CLAUDE_3_5_SONNET,
        "claude-3-7-sonnet" => anthropic::CLAUDE_3_7_SONNET,
        "claude-3-haiku" => anthropic::CLAUDE_3_HAIKU,
        "claude-3-opus" => anthropic::CLAUDE_3_OPUS,
        other => other,
    }
}
