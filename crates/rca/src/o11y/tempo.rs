//! Tempo client

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::format::TRACE_NOT_FOUND;
use super::{build_http_client, trim_base};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct TempoClient {
    base_url: String,
    client: Client,
}

/// Trace IDs are 32 hex characters; shorter IDs are accepted and Tempo
/// left-pads them itself.
fn validate_trace_id(trace_id: &str) -> Result<()> {
    if !trace_id.is_empty() && trace_id.len() <= 32 && trace_id.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid trace id: {}", trace_id)))
    }
}

impl TempoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: trim_base(base_url),
            client: build_http_client(timeout)?,
        })
    }

    /// Fetch a trace by ID. A missing or empty trace is reported as a
    /// placeholder under `trace.result`.
    pub async fn query_trace(&self, trace_id: &str) -> Result<Value> {
        validate_trace_id(trace_id)?;
        info!(trace_id = %trace_id, "Tempo trace request");

        let url = format!("{}/api/v2/traces/{}", self.base_url, trace_id);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(not_found());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let empty = match body.get("trace") {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        };

        Ok(if empty { not_found() } else { body })
    }
}

fn not_found() -> Value {
    json!({ "trace": { "result": TRACE_NOT_FOUND } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

    #[test]
    fn trace_ids_must_be_hex() {
        assert!(validate_trace_id(TRACE_ID).is_ok());
        assert!(validate_trace_id("").is_err());
        assert!(validate_trace_id("not-a-trace").is_err());
    }

    #[tokio::test]
    async fn empty_trace_becomes_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/traces/{}", TRACE_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trace": {}})))
            .mount(&server)
            .await;

        let tempo = TempoClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let trace = tempo.query_trace(TRACE_ID).await.unwrap();
        assert_eq!(trace, json!({"trace": {"result": TRACE_NOT_FOUND}}));
    }

    #[tokio::test]
    async fn missing_trace_becomes_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tempo = TempoClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let trace = tempo.query_trace(TRACE_ID).await.unwrap();
        assert_eq!(trace["trace"]["result"], json!(TRACE_NOT_FOUND));
    }

    #[tokio::test]
    async fn trace_body_is_passed_through() {
        let server = MockServer::start().await;
        let body = json!({"trace": {"resourceSpans": [{"resource": {}}]}});
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let tempo = TempoClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert_eq!(tempo.query_trace(TRACE_ID).await.unwrap(), body);
    }
}
