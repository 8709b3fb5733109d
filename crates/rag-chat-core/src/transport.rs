use async_trait::async_trait;
use reqwest::Client;
pub use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::FlowSettings;
use crate::session::TurnRequest;

/// Failure of a single flow run. Every variant is handled the same way by the
/// conversation; the distinction only matters for logs.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("flow run failed with HTTP {0}")]
    Status(StatusCode),
    #[error("could not reach flow endpoint: {0}")]
    Network(#[from] reqwest::Error),
    #[error("flow response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One-shot request/response call to a remote flow.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn run(&self, request: &TurnRequest) -> Result<Value, TransportError>;
}

#[derive(Serialize)]
struct FlowRunRequest<'a> {
    output_type: &'static str,
    input_type: &'static str,
    input_value: &'a str,
    session_id: &'a str,
}

#[derive(Clone)]
pub struct FlowClient {
    client: Client,
    settings: FlowSettings,
}

impl FlowClient {
    pub fn new(settings: FlowSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn run_url(&self) -> String {
        format!(
            "{}/api/v1/run/{}?stream=false",
            self.settings.host_url.trim_end_matches('/'),
            self.settings.flow_id
        )
    }
}

#[async_trait]
impl ChatTransport for FlowClient {
    async fn run(&self, request: &TurnRequest) -> Result<Value, TransportError> {
        let body = FlowRunRequest {
            output_type: "chat",
            input_type: "chat",
            input_value: &request.input_value,
            session_id: &request.session_id,
        };

        tracing::debug!(url = %self.run_url(), session = %request.session_id, "running flow");

        let response = self
            .client
            .post(self.run_url())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Outcome of looking up the assistant text in a flow response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    Found(&'a str),
    Missing,
}

impl<'a> Reply<'a> {
    pub fn or_placeholder(self, placeholder: &'a str) -> &'a str {
        match self {
            Reply::Found(text) => text,
            Reply::Missing => placeholder,
        }
    }
}

/// Reads `outputs[0].outputs[0].results.message.text`. An empty string counts
/// as missing.
pub fn extract_reply(payload: &Value) -> Reply<'_> {
    let text = payload
        .get("outputs")
        .and_then(|outputs| outputs.get(0))
        .and_then(|run| run.get("outputs"))
        .and_then(|outputs| outputs.get(0))
        .and_then(|output| output.get("results"))
        .and_then(|results| results.get("message"))
        .and_then(|message| message.get("text"))
        .and_then(Value::as_str);

    match text {
        Some(text) if !text.is_empty() => Reply::Found(text),
        _ => Reply::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(host_url: String) -> FlowClient {
        FlowClient::new(FlowSettings {
            host_url,
            flow_id: "flow-123".to_string(),
            api_key: "secret".to_string(),
        })
    }

    fn request() -> TurnRequest {
        TurnRequest {
            input_value: "What is RAG?".to_string(),
            session_id: "session-1".to_string(),
        }
    }

    #[test]
    fn test_extract_reply_found() {
        let payload = json!({"outputs":[{"outputs":[{"results":{"message":{"text":"Hello"}}}]}]});
        assert_eq!(extract_reply(&payload), Reply::Found("Hello"));
    }

    #[test]
    fn test_extract_reply_missing_levels() {
        let payloads = [
            json!({}),
            json!({"outputs": []}),
            json!({"outputs": [{"outputs": []}]}),
            json!({"outputs": [{"outputs": [{"results": {}}]}]}),
            json!({"outputs": [{"outputs": [{"results": {"message": {"text": 42}}}]}]}),
            json!({"outputs": [{"outputs": [{"results": {"message": {"text": ""}}}]}]}),
        ];
        for payload in &payloads {
            assert_eq!(extract_reply(payload), Reply::Missing, "{}", payload);
        }
    }

    #[test]
    fn test_run_url_trims_trailing_slash() {
        let client = client("http://localhost:7860/".to_string());
        assert_eq!(
            client.run_url(),
            "http://localhost:7860/api/v1/run/flow-123?stream=false"
        );
    }

    #[tokio::test]
    async fn test_run_posts_chat_request() {
        let router = Router::new().route(
            "/api/v1/run/:flow_id",
            post(
                |Path(flow_id): Path<String>,
                 Query(query): Query<HashMap<String, String>>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    assert_eq!(flow_id, "flow-123");
                    assert_eq!(query.get("stream").map(String::as_str), Some("false"));
                    assert_eq!(headers["x-api-key"], "secret");
                    assert_eq!(headers["content-type"], "application/json");
                    assert_eq!(
                        body,
                        json!({
                            "output_type": "chat",
                            "input_type": "chat",
                            "input_value": "What is RAG?",
                            "session_id": "session-1",
                        })
                    );
                    Json(json!({"outputs":[{"outputs":[{"results":{"message":{"text":"Hi"}}}]}]}))
                },
            ),
        );
        let host = serve(router).await;

        let payload = client(host).run(&request()).await.unwrap();
        assert_eq!(extract_reply(&payload), Reply::Found("Hi"));
    }

    #[tokio::test]
    async fn test_run_maps_http_error_status() {
        let router = Router::new().route(
            "/api/v1/run/:flow_id",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let host = serve(router).await;

        let err = client(host).run(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_run_maps_invalid_json() {
        let router = Router::new().route("/api/v1/run/:flow_id", post(|| async { "not json" }));
        let host = serve(router).await;

        let err = client(host).run(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_run_maps_refused_connection() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr))
            .run(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
