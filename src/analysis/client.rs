//! Chat-completions client with a single fallback model.
//!
//! # Responsibilities
//! - Ask the primary model for schema-constrained output with an assistant prefill
//! - On any primary failure, ask the fallback model with the prefill only
//! - Bound every call with a timeout
//! - Report which path produced the reply as a [`CallOutcome`]

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::analysis::types::AnalysisError;
use crate::config::AnalysisConfig;

/// Assistant prefill that starts the reply as an array.
pub const PREFILL: &str = "[";

/// Why a single model call did not produce content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamFailure {
    fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Result of the primary-then-fallback sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    PrimarySucceeded {
        content: String,
    },
    FallbackUsed {
        content: String,
        primary_failure: UpstreamFailure,
    },
    BothFailed {
        primary_failure: UpstreamFailure,
        fallback_failure: UpstreamFailure,
    },
}

impl CallOutcome {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::PrimarySucceeded { .. } => "primary",
            CallOutcome::FallbackUsed { .. } => "fallback",
            CallOutcome::BothFailed { .. } => "upstream_unavailable",
        }
    }

    /// The reply content, or the fallback failure when neither call worked.
    pub fn into_content(self) -> Result<String, AnalysisError> {
        match self {
            CallOutcome::PrimarySucceeded { content } => Ok(content),
            CallOutcome::FallbackUsed { content, .. } => Ok(content),
            CallOutcome::BothFailed {
                fallback_failure, ..
            } => Err(AnalysisError::upstream(
                fallback_failure.status,
                fallback_failure.message,
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

/// JSON schema sent with the primary request.
fn finding_list_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "vulnerability_list",
            "strict": true,
            "schema": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "line": { "type": "integer", "minimum": 0 },
                        "issueType": { "type": "string" },
                        "severity": { "type": "string", "enum": ["LOW", "MEDIUM", "HIGH"] },
                        "description": { "type": "string" }
                    },
                    "required": ["line", "issueType", "severity", "description"],
                    "additionalProperties": false
                }
            }
        }
    })
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct ModelClient {
    http: Client,
    api_url: String,
    api_key: String,
    primary_model: String,
    fallback_model: String,
    timeout_duration: Duration,
}

impl ModelClient {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, reqwest::Error> {
        let timeout_duration = Duration::from_secs(config.request_timeout_secs);
        // The whole call, body read included, is bounded in `call`.
        let http = Client::builder().connect_timeout(timeout_duration).build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            timeout_duration,
        })
    }

    /// Run the primary call and, if it fails, the fallback call.
    pub async fn complete(&self, prompt: &str) -> CallOutcome {
        let primary = ChatRequest {
            model: &self.primary_model,
            messages: messages(prompt),
            response_format: Some(finding_list_schema()),
        };

        let primary_failure = match self.call(&primary).await {
            Ok(content) => return CallOutcome::PrimarySucceeded { content },
            Err(failure) => failure,
        };

        tracing::warn!(
            model = %self.primary_model,
            status = ?primary_failure.status,
            error = %primary_failure.message,
            "Primary model call failed, trying fallback"
        );

        let fallback = ChatRequest {
            model: &self.fallback_model,
            messages: messages(prompt),
            response_format: None,
        };

        match self.call(&fallback).await {
            Ok(content) => CallOutcome::FallbackUsed {
                content,
                primary_failure,
            },
            Err(fallback_failure) => {
                tracing::error!(
                    model = %self.fallback_model,
                    status = ?fallback_failure.status,
                    error = %fallback_failure.message,
                    "Fallback model call failed"
                );
                CallOutcome::BothFailed {
                    primary_failure,
                    fallback_failure,
                }
            }
        }
    }

    async fn call(&self, request: &ChatRequest<'_>) -> Result<String, UpstreamFailure> {
        let fut = async {
            let response = self
                .http
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
                .map_err(|e| UpstreamFailure::new(None, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamFailure::new(Some(status.as_u16()), body));
            }

            let parsed: ChatResponse = response.json().await.map_err(|e| {
                UpstreamFailure::new(Some(status.as_u16()), format!("unreadable body: {e}"))
            })?;

            extract_content(parsed)
                .ok_or_else(|| UpstreamFailure::new(Some(status.as_u16()), "no content in reply"))
        };

        match timeout(self.timeout_duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamFailure::new(
                None,
                format!("timed out after {}s", self.timeout_duration.as_secs()),
            )),
        }
    }
}

fn messages(prompt: &str) -> [ChatMessage<'_>; 2] {
    [
        ChatMessage {
            role: "user",
            content: prompt,
        },
        ChatMessage {
            role: "assistant",
            content: PREFILL,
        },
    ]
}

/// Non-string content is kept as its JSON text.
fn extract_content(response: ChatResponse) -> Option<String> {
    let content = response.choices.into_iter().next()?.message.content?;
    match content {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("api_url", &self.api_url)
            .field("primary_model", &self.primary_model)
            .field("fallback_model", &self.fallback_model)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> AnalysisConfig {
        AnalysisConfig {
            api_url: format!("{}/chat/completions", server.uri()),
            api_key: "test-key".to_string(),
            primary_model: "primary-model".to_string(),
            fallback_model: "fallback-model".to_string(),
            request_timeout_secs: 2,
            ..AnalysisConfig::default()
        }
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }))
    }

    #[tokio::test]
    async fn test_primary_success_sends_schema_and_prefill() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "primary-model",
                "messages": [{ "role": "user" }, { "role": "assistant", "content": "[" }],
                "response_format": { "type": "json_schema" }
            })))
            .respond_with(reply("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ModelClient::from_config(&config(&server)).unwrap();
        let outcome = client.complete("prompt").await;
        assert_eq!(
            outcome,
            CallOutcome::PrimarySucceeded {
                content: "[]".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "model": "primary-model" })))
            .respond_with(ResponseTemplate::new(400).set_body_string("response_format unsupported"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "model": "fallback-model" })))
            .respond_with(reply("]"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ModelClient::from_config(&config(&server)).unwrap();
        match client.complete("prompt").await {
            CallOutcome::FallbackUsed {
                content,
                primary_failure,
            } => {
                assert_eq!(content, "]");
                assert_eq!(primary_failure.status, Some(400));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let requests = server.received_requests().await.unwrap();
        let fallback: Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert!(fallback.get("response_format").is_none());
    }

    #[tokio::test]
    async fn test_both_failed_carries_fallback_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = ModelClient::from_config(&config(&server)).unwrap();
        let outcome = client.complete("prompt").await;
        assert_eq!(outcome.label(), "upstream_unavailable");

        let err = outcome.into_content().unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::UpstreamUnavailable {
                status: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_content_triggers_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "model": "primary-model" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "model": "fallback-model" })))
            .respond_with(reply("[]"))
            .mount(&server)
            .await;

        let client = ModelClient::from_config(&config(&server)).unwrap();
        assert_eq!(client.complete("prompt").await.label(), "fallback");
    }

    #[tokio::test]
    async fn test_timeout_fails_both_calls_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("[]").set_delay(Duration::from_secs(3)))
            .expect(2)
            .mount(&server)
            .await;

        let config = AnalysisConfig {
            request_timeout_secs: 1,
            ..config(&server)
        };
        let client = ModelClient::from_config(&config).unwrap();
        match client.complete("prompt").await {
            CallOutcome::BothFailed {
                primary_failure,
                fallback_failure,
            } => {
                assert_eq!(primary_failure.status, None);
                assert_eq!(fallback_failure.message, "timed out after 1s");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_non_string_content_kept_as_json() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": [{ "line": 1 }] } }]
        }))
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), r#"[{"line":1}]"#);
    }
}
