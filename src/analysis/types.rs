//! Finding types and analysis errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Wire names, in the order given to the model.
    pub const NAMES: [&'static str; 3] = ["LOW", "MEDIUM", "HIGH"];

    /// Parse the exact wire name.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            _ => None,
        }
    }
}

/// A single security finding reported for a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Line in the snippet (0 when the issue is not tied to a line).
    pub line: u64,
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
}

/// Coarse category of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    SnippetTooLarge,
    ResponseMalformed,
    ResponseSchemaInvalid,
    UpstreamUnavailable,
}

/// Errors produced by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("snippet of {size} bytes exceeds the {limit} byte limit")]
    SnippetTooLarge { size: usize, limit: usize },

    #[error("model reply is not valid JSON: {reason}")]
    ResponseMalformed { reason: String },

    #[error("model reply failed validation: {}", fields.join("; "))]
    ResponseSchemaInvalid { fields: Vec<String> },

    /// Status and message are for server logs only.
    #[error("model provider unavailable (status {status:?}): {message}")]
    UpstreamUnavailable { status: Option<u16>, message: String },
}

impl AnalysisError {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            AnalysisError::SnippetTooLarge { .. } => AnalysisErrorKind::SnippetTooLarge,
            AnalysisError::ResponseMalformed { .. } => AnalysisErrorKind::ResponseMalformed,
            AnalysisError::ResponseSchemaInvalid { .. } => AnalysisErrorKind::ResponseSchemaInvalid,
            AnalysisError::UpstreamUnavailable { .. } => AnalysisErrorKind::UpstreamUnavailable,
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        AnalysisError::UpstreamUnavailable {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        AnalysisError::ResponseMalformed {
            reason: reason.into(),
        }
    }

    pub fn schema_invalid(fields: Vec<String>) -> Self {
        AnalysisError::ResponseSchemaInvalid { fields }
    }
}
