//! HTTP error mapping.
//!
//! Every error leaving a handler or middleware becomes a JSON body of the
//! form `{"code": "...", "message": "..."}`. Upstream and internal causes are
//! logged here and replaced by generic text.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::{AnalysisError, AnalysisErrorKind};

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("malformed request: {0}")]
    RequestMalformed(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RequestMalformed(_) => StatusCode::BAD_REQUEST,
            ApiError::Analysis(e) => match e.kind() {
                AnalysisErrorKind::SnippetTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHORIZED",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::RequestMalformed(_) => "INVALID_REQUEST",
            ApiError::Analysis(e) => match e.kind() {
                AnalysisErrorKind::SnippetTooLarge => "PAYLOAD_TOO_LARGE",
                AnalysisErrorKind::ResponseMalformed => "LLM_RESPONSE_PARSE_ERROR",
                AnalysisErrorKind::ResponseSchemaInvalid => "LLM_RESPONSE_SCHEMA_ERROR",
                AnalysisErrorKind::UpstreamUnavailable => "LLM_CALL_ERROR",
            },
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            ApiError::Unauthenticated => "Authentication required".to_string(),
            ApiError::RateLimited { retry_after_secs } => {
                format!("Too many requests. Try again in {retry_after_secs} seconds.")
            }
            ApiError::PayloadTooLarge => "Payload too large".to_string(),
            ApiError::RequestMalformed(detail) => detail.clone(),
            ApiError::Analysis(e) => {
                tracing::error!(error = %e, code, "Analysis failed");
                match e.kind() {
                    AnalysisErrorKind::SnippetTooLarge => "Payload too large".to_string(),
                    AnalysisErrorKind::ResponseMalformed => {
                        "Invalid JSON format from LLM".to_string()
                    }
                    AnalysisErrorKind::ResponseSchemaInvalid => {
                        "LLM response format is incorrect".to_string()
                    }
                    AnalysisErrorKind::UpstreamUnavailable => {
                        "Failed to call LLM".to_string()
                    }
                }
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "Internal server error".to_string()
            }
        };

        let retry_after = match self {
            ApiError::RateLimited { retry_after_secs } => Some(retry_after_secs),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                code,
                message: &message,
                retry_after,
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
