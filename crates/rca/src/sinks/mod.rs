//! Report sinks
//!
//! Every finished analysis is handed to each configured sink.

pub mod slack;
pub mod stdout;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::agent::RcaReport;
use crate::chat::ReplyTarget;
use crate::config::Config;
use crate::Result;

pub use slack::SlackSink;
pub use stdout::StdoutSink;

/// A report together with where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub job_id: String,
    pub report: RcaReport,
    /// Text that reproduces the analysis when submitted as a chat request.
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyTarget>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, delivery: &Delivery) -> Result<()>;
}

/// Build the sinks enabled by configuration. Stdout is always on.
pub fn from_config(config: &Config) -> Result<Vec<Arc<dyn ReportSink>>> {
    let mut sinks: Vec<Arc<dyn ReportSink>> = vec![Arc::new(StdoutSink::new(
        config.report.format.clone(),
        config.report.pretty,
    ))];

    if let Some(slack) = SlackSink::from_config(&config.slack)? {
        sinks.push(Arc::new(slack));
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_is_always_enabled() {
        let sinks = from_config(&Config::default()).unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "stdout");
    }

    #[test]
    fn slack_sink_follows_bot_token() {
        let mut config = Config::default();
        config.slack.bot_token = Some("xoxb-test".to_string());
        let names: Vec<_> = from_config(&config)
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["stdout", "slack"]);
    }
}
