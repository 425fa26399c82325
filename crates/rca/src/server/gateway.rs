//! Observability gateway
//!
//! `POST /o11y/...` routes that run a backend query and answer with the
//! same reshaped JSON the agent tools see. Parameters come from the query
//! string.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use super::Server;
use crate::o11y::prometheus::metric_series_rows;
use crate::o11y::{LokiRangeParams, PrometheusRangeParams, NO_DATA_FOUND};
use crate::Error;

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    label: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectorQuery {
    selector: String,
}

#[derive(Debug, Deserialize)]
pub struct MetricQuery {
    metric: String,
}

#[derive(Debug, Deserialize)]
pub struct TraceQuery {
    trace_id: String,
}

fn invalid_params(rejection: QueryRejection) -> Response {
    warn!("Failed to bind query parameters: {}", rejection);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid query parameters" })),
    )
        .into_response()
}

fn respond<T: Serialize>(result: crate::Result<T>, failure: &str) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(Error::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(e) => {
            error!("{}: {}", failure, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": failure })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Loki
// =============================================================================

pub async fn loki_query_range(
    State(server): State<Arc<Server>>,
    params: Result<Query<LokiRangeParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };
    respond(
        server.clients.loki.query_range(&params).await,
        "failed to get query range response from loki",
    )
}

pub async fn loki_labels(State(server): State<Arc<Server>>) -> Response {
    respond(
        server.clients.loki.labels().await,
        "failed to get labels from loki",
    )
}

pub async fn loki_label_values(
    State(server): State<Arc<Server>>,
    params: Result<Query<LabelQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };
    respond(
        server.clients.loki.label_values(&params.label).await,
        "failed to get label values from loki",
    )
}

pub async fn loki_streams_selector_has(
    State(server): State<Arc<Server>>,
    params: Result<Query<SelectorQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };
    respond(
        server.clients.loki.series(&params.selector).await,
        "failed to get streams from loki",
    )
}

// =============================================================================
// Prometheus
// =============================================================================

pub async fn prometheus_query_range(
    State(server): State<Arc<Server>>,
    params: Result<Query<PrometheusRangeParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };
    respond(
        server.clients.prometheus.query_range(&params).await,
        "failed to get query range response from Prometheus",
    )
}

pub async fn prometheus_labels(State(server): State<Arc<Server>>) -> Response {
    respond(
        server.clients.prometheus.labels().await,
        "failed to get labels from Prometheus",
    )
}

pub async fn prometheus_label_values(
    State(server): State<Arc<Server>>,
    params: Result<Query<LabelQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };

    match server.clients.prometheus.label_values(&params.label).await {
        Ok(values) if values.is_empty() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "result": NO_DATA_FOUND })),
        )
            .into_response(),
        other => respond(other, "failed to get label values from Prometheus"),
    }
}

pub async fn prometheus_all_metrics(State(server): State<Arc<Server>>) -> Response {
    respond(
        server.clients.prometheus.all_metrics().await,
        "failed to get metrics from Prometheus",
    )
}

pub async fn prometheus_labels_values_metric_has(
    State(server): State<Arc<Server>>,
    params: Result<Query<MetricQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };
    respond(
        server
            .clients
            .prometheus
            .series(&params.metric)
            .await
            .map(metric_series_rows),
        "failed to get series from Prometheus",
    )
}

// =============================================================================
// Tempo
// =============================================================================

pub async fn tempo_query_trace(
    State(server): State<Arc<Server>>,
    params: Result<Query<TraceQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params(rejection),
    };
    respond(
        server.clients.tempo.query_trace(&params.trace_id).await,
        "failed to get trace from tempo",
    )
}
