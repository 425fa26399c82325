//! Slack Web API client and event payloads

use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SlackConfig;
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Requests older than this are rejected as possible replays.
pub const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

/// Action id of the button that re-runs an analysis.
pub const RERUN_ACTION_ID: &str = "rerun_analysis";

lazy_static! {
    static ref MENTION: Regex = Regex::new(r"<@[^>]+>").expect("mention pattern is valid");
}

/// Remove `<@U123>` user mentions and surrounding whitespace.
pub fn strip_mention(text: &str) -> String {
    MENTION.replace_all(text, "").trim().to_string()
}

/// Verify a request signed with Slack's `v0` scheme.
pub fn verify_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    verify_signature_at(secret, timestamp, body, signature, chrono::Utc::now().timestamp())
}

fn verify_signature_at(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> bool {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now - ts).abs() > MAX_REQUEST_AGE_SECS {
        warn!(timestamp = ts, "Stale Slack request");
        return false;
    }

    let Some(Ok(expected)) = signature.strip_prefix("v0=").map(hex::decode) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

// =============================================================================
// Inbound payloads
// =============================================================================

/// Body of a request to the Events API endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: SlackEvent },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Set on messages posted by bots, including this one.
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl SlackEvent {
    /// Thread to answer in: the existing thread, or a new one under the
    /// triggering message.
    pub fn reply_thread(&self) -> Option<String> {
        self.thread_ts.clone().or_else(|| self.ts.clone())
    }
}

/// The `payload` form field of an interactivity request.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub interaction_type: String,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
    #[serde(default)]
    pub message: Option<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

// =============================================================================
// Block Kit
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    Section { text: SlackText },
    Divider,
    Context { elements: Vec<SlackText> },
    Actions { elements: Vec<SlackButton> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackText {
    #[serde(rename = "type")]
    text_type: &'static str,
    text: String,
}

impl SlackText {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn",
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text",
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackButton {
    #[serde(rename = "type")]
    element_type: &'static str,
    text: SlackText,
    action_id: String,
    value: String,
}

impl SlackButton {
    pub fn new(label: &str, action_id: &str, value: String) -> Self {
        Self {
            element_type: "button",
            text: SlackText::plain(label),
            action_id: action_id.to_string(),
            value,
        }
    }
}

// =============================================================================
// Web API client
// =============================================================================

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    #[serde(skip_serializing_if = "<[SlackBlock]>::is_empty")]
    blocks: &'a [SlackBlock],
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SlackClient {
    bot_token: String,
    api_base: String,
    client: Client,
}

impl SlackClient {
    pub fn new(bot_token: String, api_base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build a client when a bot token is configured.
    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>> {
        match &config.bot_token {
            Some(token) => Ok(Some(Self::new(token.clone(), &config.api_base)?)),
            None => {
                debug!("Slack replies disabled (SLACK_BOT_TOKEN not set)");
                Ok(None)
            }
        }
    }

    /// Post a message via `chat.postMessage`, returning its `ts`.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
        blocks: &[SlackBlock],
    ) -> Result<Option<String>> {
        let body = PostMessage {
            channel,
            text,
            thread_ts,
            blocks,
        };

        debug!(channel = %channel, thread_ts = ?thread_ts, "Posting Slack message");

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            warn!(retry_after_secs = retry_after, "Rate limited by Slack");
            return Err(Error::Chat(format!(
                "Rate limited by Slack, retry after {}s",
                retry_after
            )));
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("Slack returned {}: {}", status, body)));
        }

        let reply: ApiReply = response.json().await?;
        if !reply.ok {
            return Err(Error::Chat(format!(
                "chat.postMessage failed: {}",
                reply.error.unwrap_or_else(|| "unknown_error".to_string())
            )));
        }

        Ok(reply.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("v0:{}:", timestamp).as_bytes());
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn mentions_are_stripped() {
        assert_eq!(strip_mention("<@U024BE7LH> why is checkout slow?"), "why is checkout slow?");
        assert_eq!(strip_mention("ask <@U1> and <@U2|bob> now"), "ask  and  now");
        assert_eq!(strip_mention("no mention"), "no mention");
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = b"token=x&team_id=T1";
        let signature = sign("s3cret", "1750000000", body);
        assert!(verify_signature_at("s3cret", "1750000000", body, &signature, 1750000100));
    }

    #[test]
    fn tampered_or_stale_requests_are_rejected() {
        let body = b"{\"type\":\"event_callback\"}";
        let signature = sign("s3cret", "1750000000", body);

        assert!(!verify_signature_at("other", "1750000000", body, &signature, 1750000000));
        assert!(!verify_signature_at("s3cret", "1750000000", b"{}", &signature, 1750000000));
        assert!(!verify_signature_at("s3cret", "1750000000", body, &signature, 1750000000 + 301));
        assert!(!verify_signature_at("s3cret", "1750000000", body, "v1=abc", 1750000000));
        assert!(!verify_signature_at("s3cret", "soon", body, &signature, 1750000000));
    }

    #[test]
    fn envelopes_are_parsed() {
        let envelope: SlackEnvelope =
            serde_json::from_value(json!({"type": "url_verification", "challenge": "abc"})).unwrap();
        assert!(matches!(envelope, SlackEnvelope::UrlVerification { challenge } if challenge == "abc"));

        let envelope: SlackEnvelope = serde_json::from_value(json!({
            "type": "event_callback",
            "event": {"type": "app_mention", "text": "<@U1> hi", "channel": "C1", "ts": "171.01"}
        }))
        .unwrap();
        match envelope {
            SlackEnvelope::EventCallback { event } => {
                assert_eq!(event.event_type, "app_mention");
                assert_eq!(event.reply_thread().as_deref(), Some("171.01"));
            }
            other => panic!("unexpected envelope: {:?}", other),
        }

        let envelope: SlackEnvelope =
            serde_json::from_value(json!({"type": "app_rate_limited"})).unwrap();
        assert!(matches!(envelope, SlackEnvelope::Unsupported));
    }

    #[test]
    fn blocks_serialize_as_block_kit() {
        let blocks = vec![
            SlackBlock::Section {
                text: SlackText::mrkdwn("*hello*"),
            },
            SlackBlock::Actions {
                elements: vec![SlackButton::new("Re-run", RERUN_ACTION_ID, "q".to_string())],
            },
        ];
        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([
                {"type": "section", "text": {"type": "mrkdwn", "text": "*hello*"}},
                {"type": "actions", "elements": [{
                    "type": "button",
                    "text": {"type": "plain_text", "text": "Re-run"},
                    "action_id": "rerun_analysis",
                    "value": "q"
                }]}
            ])
        );
    }

    #[tokio::test]
    async fn post_message_sends_thread_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("Authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({"channel": "C1", "thread_ts": "171.01"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "171.02"})))
            .expect(1)
            .mount(&server)
            .await;

        let slack = SlackClient::new("xoxb-test".to_string(), &server.uri()).unwrap();
        let ts = slack
            .post_message("C1", "done", Some("171.01"), &[])
            .await
            .unwrap();
        assert_eq!(ts.as_deref(), Some("171.02"));
    }

    #[tokio::test]
    async fn api_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let slack = SlackClient::new("xoxb-test".to_string(), &server.uri()).unwrap();
        let err = slack.post_message("C404", "x", None, &[]).await.unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }
}
