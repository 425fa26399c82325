mod gateway;
mod routes;
mod slack;
mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::Config, dispatch::Dispatcher, o11y::O11yClients, Result};

pub struct Server {
    dispatcher: Dispatcher,
    clients: O11yClients,
    signing_secret: Option<String>,
}

impl Server {
    pub fn new(config: &Config, dispatcher: Dispatcher, clients: O11yClients) -> Self {
        Self {
            dispatcher,
            clients,
            signing_secret: config.slack.signing_secret.clone(),
        }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/", get(routes::root))
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route("/webhook", post(webhook::receive_alerts))
            .route("/slack/events", post(slack::events))
            .route("/slack/interactions", post(slack::interactions))
            .route("/o11y/loki/api/v1/query_range", post(gateway::loki_query_range))
            .route("/o11y/loki/api/v1/labels", post(gateway::loki_labels))
            .route("/o11y/loki/api/v1/label_values", post(gateway::loki_label_values))
            .route(
                "/o11y/loki/api/v1/streams_selector_has",
                post(gateway::loki_streams_selector_has),
            )
            .route(
                "/o11y/prometheus/api/v1/query_range",
                post(gateway::prometheus_query_range),
            )
            .route("/o11y/prometheus/api/v1/labels", post(gateway::prometheus_labels))
            .route(
                "/o11y/prometheus/api/v1/label_values",
                post(gateway::prometheus_label_values),
            )
            .route(
                "/o11y/prometheus/api/v1/all_metrics",
                post(gateway::prometheus_all_metrics),
            )
            .route(
                "/o11y/prometheus/api/v1/labels_values_metric_has",
                post(gateway::prometheus_labels_values_metric_has),
            )
            .route("/o11y/tempo/api/query_trace", post(gateway::tempo_query_trace))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", addr);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
