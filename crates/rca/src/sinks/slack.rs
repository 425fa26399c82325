//! Slack report sink
//!
//! Chat requests are answered in their thread. Alert reports go to the
//! configured channel, or nowhere when none is set.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Delivery, ReportSink};
use crate::chat::slack::{SlackBlock, SlackButton, SlackClient, SlackText, RERUN_ACTION_ID};
use crate::chat::ReplyTarget;
use crate::config::SlackConfig;
use crate::Result;

/// Slack rejects button values longer than this.
const MAX_BUTTON_VALUE: usize = 2000;

/// Slack rejects section text longer than this.
const MAX_SECTION_TEXT: usize = 3000;

pub struct SlackSink {
    client: SlackClient,
    default_channel: Option<String>,
}

impl SlackSink {
    pub fn new(client: SlackClient, default_channel: Option<String>) -> Self {
        Self {
            client,
            default_channel,
        }
    }

    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>> {
        Ok(SlackClient::from_config(config)?
            .map(|client| Self::new(client, config.channel.clone())))
    }

    fn target(&self, delivery: &Delivery) -> Option<ReplyTarget> {
        delivery.reply_to.clone().or_else(|| {
            self.default_channel
                .as_ref()
                .map(|channel| ReplyTarget::new(channel.clone(), None))
        })
    }

    fn format_blocks(delivery: &Delivery) -> Vec<SlackBlock> {
        let report = &delivery.report;

        let mut blocks = vec![SlackBlock::Section {
            text: SlackText::mrkdwn(format!(
                ":mag: *Root Cause Analysis: {}*",
                truncate(&report.alert_name, 200)
            )),
        }];

        let mut analysis = split_text(&report.analysis_results, MAX_SECTION_TEXT);
        if analysis.is_empty() {
            analysis.push("_No analysis returned._".to_string());
        }
        blocks.extend(analysis.into_iter().map(|chunk| SlackBlock::Section {
            text: SlackText::mrkdwn(chunk),
        }));

        if let Some(command) = &report.final_command {
            blocks.push(SlackBlock::Divider);
            blocks.push(SlackBlock::Section {
                text: SlackText::mrkdwn(format!(
                    "*Proposed command*\n```{}```",
                    truncate(command, MAX_SECTION_TEXT - 32)
                )),
            });
        }

        blocks.push(SlackBlock::Actions {
            elements: vec![SlackButton::new(
                "Re-run analysis",
                RERUN_ACTION_ID,
                truncate(&delivery.request, MAX_BUTTON_VALUE),
            )],
        });

        blocks.push(SlackBlock::Context {
            elements: vec![SlackText::mrkdwn(format!("job `{}`", delivery.job_id))],
        });

        blocks
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Split text into chunks of at most `max_chars` characters, breaking at
/// line ends where possible.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for mut line in text.split_inclusive('\n') {
        loop {
            let line_len = line.chars().count();
            if current_len + line_len <= max_chars {
                current.push_str(line);
                current_len += line_len;
                break;
            }
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // A single line longer than a whole chunk
            let split = line
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            chunks.push(line[..split].to_string());
            line = &line[split..];
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end_matches('\n').to_string())
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

#[async_trait]
impl ReportSink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, delivery: &Delivery) -> Result<()> {
        let Some(target) = self.target(delivery) else {
            debug!(job_id = %delivery.job_id, "No Slack channel for report, skipping");
            return Ok(());
        };

        let fallback = format!("Root Cause Analysis: {}", delivery.report.alert_name);
        let blocks = Self::format_blocks(delivery);

        self.client
            .post_message(
                &target.channel,
                &fallback,
                target.thread_ts.as_deref(),
                &blocks,
            )
            .await?;

        info!(job_id = %delivery.job_id, channel = %target.channel, "Report posted to Slack");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::parse_report;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delivery(reply_to: Option<ReplyTarget>) -> Delivery {
        Delivery {
            job_id: "job-7".to_string(),
            report: parse_report(
                "HighErrorRate",
                "ANALYSIS: postgres restarted\nCOMMAND: kubectl rollout restart deploy/api",
            ),
            request: "why are there 5xx on api?".to_string(),
            reply_to,
        }
    }

    fn sink(server: &MockServer, channel: Option<&str>) -> SlackSink {
        let client = SlackClient::new("xoxb-test".to_string(), &server.uri()).unwrap();
        SlackSink::new(client, channel.map(String::from))
    }

    #[test]
    fn blocks_include_command_and_rerun_button() {
        let blocks = serde_json::to_value(SlackSink::format_blocks(&delivery(None))).unwrap();
        let text = blocks.to_string();

        assert!(text.contains("kubectl rollout restart deploy/api"));
        assert!(text.contains(RERUN_ACTION_ID));
        assert!(text.contains("why are there 5xx on api?"));
    }

    #[test]
    fn button_values_are_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("日本語", 2), "日本");
    }

    #[test]
    fn long_analysis_is_split_into_sections() {
        let paragraph = format!("{}\n", "connection refused to postgres:5432. ".repeat(20));
        let analysis = paragraph.repeat(7);
        assert!(analysis.chars().count() > 5000);

        let mut delivery = delivery(None);
        delivery.report.analysis_results = analysis.clone();

        let blocks = serde_json::to_value(SlackSink::format_blocks(&delivery)).unwrap();
        let sections: Vec<&str> = blocks
            .as_array()
            .unwrap()
            .iter()
            .filter(|block| block["type"] == "section")
            .map(|block| block["text"]["text"].as_str().unwrap())
            .collect();

        assert!(sections.iter().all(|text| text.chars().count() <= MAX_SECTION_TEXT));
        // header + at least two analysis chunks + command
        assert!(sections.len() >= 4);
        let rejoined: String = sections[1..sections.len() - 1].join("");
        assert_eq!(rejoined.replace('\n', ""), analysis.replace('\n', ""));
    }

    #[test]
    fn overlong_lines_are_cut() {
        let chunks = split_text(&"x".repeat(7000), 3000);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![3000, 3000, 1000]);
        assert!(split_text("", 3000).is_empty());
    }

    #[tokio::test]
    async fn replies_in_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"channel": "C9", "thread_ts": "17.5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let target = ReplyTarget::new("C9", Some("17.5".to_string()));
        sink(&server, Some("C-alerts"))
            .send(&delivery(Some(target)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn skips_without_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(0)
            .mount(&server)
            .await;

        sink(&server, None).send(&delivery(None)).await.unwrap();
    }
}
