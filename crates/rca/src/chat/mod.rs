//! Chat front-end
//!
//! Slack mentions and button clicks feed the analysis queue; reports are
//! posted back into the originating thread.

pub mod slack;

use serde::{Deserialize, Serialize};

pub use slack::{strip_mention, verify_signature, SlackClient, SlackEnvelope, SlackEvent};

/// Where a report should be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub channel: String,
    pub thread_ts: Option<String>,
}

impl ReplyTarget {
    pub fn new(channel: impl Into<String>, thread_ts: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts,
        }
    }
}
