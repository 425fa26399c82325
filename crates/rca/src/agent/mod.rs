//! LLM Agent Runtime Module
//!
//! This module provides the LLM-powered root cause analysis agent and the
//! observability tools it investigates with.

pub mod prompt;
pub mod provider;
pub mod result;
pub mod runtime;
pub mod tools;

pub use provider::{LLMConfig, LLMProviderType};
pub use result::{parse_report, RcaReport};
pub use runtime::RcaAgent;
pub use tools::ToolError;
