//! Slack Events API and interactivity endpoints

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::Server;
use crate::chat::slack::{InteractionPayload, RERUN_ACTION_ID};
use crate::chat::{strip_mention, verify_signature, ReplyTarget, SlackEnvelope, SlackEvent};
use crate::dispatch::AnalysisJob;

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
const RETRY_HEADER: &str = "x-slack-retry-num";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Reject the request unless it carries a valid signature. Passes when no
/// signing secret is configured.
fn authenticate(server: &Server, headers: &HeaderMap, body: &[u8]) -> Result<(), Response> {
    let Some(secret) = &server.signing_secret else {
        return Ok(());
    };

    let verified = match (header(headers, TIMESTAMP_HEADER), header(headers, SIGNATURE_HEADER)) {
        (Some(timestamp), Some(signature)) => verify_signature(secret, timestamp, body, signature),
        _ => false,
    };

    if verified {
        Ok(())
    } else {
        warn!("Rejected Slack request with an invalid signature");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid signature" })),
        )
            .into_response())
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn enqueue(server: &Server, text: String, reply_to: ReplyTarget) -> Response {
    match server.dispatcher.submit(AnalysisJob::Chat {
        text,
        reply_to: Some(reply_to),
    }) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            error!("Failed to queue chat analysis: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to queue analysis" })),
            )
                .into_response()
        }
    }
}

pub async fn events(
    State(server): State<Arc<Server>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authenticate(&server, &headers, &body) {
        return rejection;
    }

    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed Slack event: {}", e);
            return bad_request("invalid event payload");
        }
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            Json(json!({ "challenge": challenge })).into_response()
        }
        SlackEnvelope::EventCallback { event } => {
            // Slack redelivers events it thinks timed out; the first copy is
            // already queued.
            if let Some(retry) = header(&headers, RETRY_HEADER) {
                debug!(retry, "Ignoring redelivered Slack event");
                return StatusCode::OK.into_response();
            }
            handle_event(&server, event)
        }
        SlackEnvelope::Unsupported => StatusCode::OK.into_response(),
    }
}

fn handle_event(server: &Server, event: SlackEvent) -> Response {
    if event.event_type != "app_mention" || event.bot_id.is_some() {
        debug!(event_type = %event.event_type, "Ignoring Slack event");
        return StatusCode::OK.into_response();
    }

    let Some(channel) = event.channel.clone() else {
        warn!("Mention without a channel, ignoring");
        return StatusCode::OK.into_response();
    };

    let text = strip_mention(&event.text);
    if text.is_empty() {
        debug!("Empty mention, ignoring");
        return StatusCode::OK.into_response();
    }

    info!(user = ?event.user, channel = %channel, "Chat analysis requested");
    enqueue(server, text, ReplyTarget::new(channel, event.reply_thread()))
}

pub async fn interactions(
    State(server): State<Arc<Server>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authenticate(&server, &headers, &body) {
        return rejection;
    }

    let Some(raw) = url::form_urlencoded::parse(&body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
    else {
        return bad_request("missing payload");
    };

    let payload: InteractionPayload = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Malformed Slack interaction: {}", e);
            return bad_request("invalid interaction payload");
        }
    };

    if payload.interaction_type != "block_actions" {
        debug!(interaction_type = %payload.interaction_type, "Ignoring Slack interaction");
        return StatusCode::OK.into_response();
    }

    let Some(text) = payload
        .actions
        .iter()
        .find(|action| action.action_id == RERUN_ACTION_ID)
        .and_then(|action| action.value.clone())
        .filter(|value| !value.trim().is_empty())
    else {
        return StatusCode::OK.into_response();
    };

    let Some(channel) = payload.channel.map(|c| c.id) else {
        warn!("Re-run clicked outside a channel, ignoring");
        return StatusCode::OK.into_response();
    };
    let thread_ts = payload.message.map(|m| m.thread_ts.unwrap_or(m.ts));

    info!(channel = %channel, "Re-run of analysis requested");
    enqueue(&server, text, ReplyTarget::new(channel, thread_ts))
}
