//! Grafana contact point webhook

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::Server;
use crate::alert::GrafanaWebhook;
use crate::dispatch::AnalysisJob;
use crate::metrics::ALERTS_RECEIVED_TOTAL;

/// Accept a Grafana notification and queue one analysis per alert.
///
/// Always answers `{"status": "received"}`; bad payloads are only logged.
pub async fn receive_alerts(
    State(server): State<Arc<Server>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if body.is_empty() {
        info!("No POST data received");
        return Json(json!({ "status": "received" }));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.contains("application/json") {
        match serde_json::from_slice::<GrafanaWebhook>(&body) {
            Ok(webhook) => enqueue_alerts(&server, webhook),
            Err(e) => warn!(
                "Malformed webhook JSON ({}). Raw data: {}",
                e,
                String::from_utf8_lossy(&body)
            ),
        }
    } else if content_type.contains("application/x-www-form-urlencoded") {
        let fields: Vec<(String, String)> = url::form_urlencoded::parse(&body)
            .into_owned()
            .collect();
        info!(?fields, "Form data received on webhook");
    } else {
        info!("Raw data: {}", String::from_utf8_lossy(&body));
    }

    Json(json!({ "status": "received" }))
}

fn enqueue_alerts(server: &Server, webhook: GrafanaWebhook) {
    info!(
        receiver = %webhook.receiver,
        status = %webhook.status,
        alerts = webhook.alerts.len(),
        "Webhook received"
    );

    for (index, decoded) in webhook.decode_alerts().enumerate() {
        let alert = match decoded {
            Ok(alert) => alert,
            Err(e) => {
                warn!(index, "Skipping malformed alert: {}", e);
                continue;
            }
        };

        ALERTS_RECEIVED_TOTAL.inc();
        info!(
            status = ?alert.status,
            labels = ?alert.labels,
            annotations = ?alert.annotations,
            "Alert received"
        );

        let alert_name = alert.alert_name().to_string();
        if let Err(e) = server.dispatcher.submit(AnalysisJob::Alert { alert }) {
            error!(alert_name = %alert_name, "Failed to queue alert analysis: {}", e);
        }
    }
}
