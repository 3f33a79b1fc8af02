//! Snippet analysis pipeline.

use crate::analysis::client::{CallOutcome, ModelClient};
use crate::analysis::prompt::PromptTemplate;
use crate::analysis::types::{AnalysisError, Finding};
use crate::analysis::validate::parse_findings;
use crate::observability::metrics;

/// Turns a code snippet into validated findings.
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    client: ModelClient,
    template: PromptTemplate,
    max_snippet_bytes: usize,
}

impl AnalysisPipeline {
    pub fn new(client: ModelClient, template: PromptTemplate, max_snippet_bytes: usize) -> Self {
        Self {
            client,
            template,
            max_snippet_bytes,
        }
    }

    /// Analyze one snippet.
    ///
    /// The size check runs before any model call. The model's reply is
    /// parsed and validated; nothing unvalidated is returned.
    pub async fn analyze(&self, snippet: &str) -> Result<Vec<Finding>, AnalysisError> {
        if snippet.len() > self.max_snippet_bytes {
            metrics::record_analysis("too_large");
            return Err(AnalysisError::SnippetTooLarge {
                size: snippet.len(),
                limit: self.max_snippet_bytes,
            });
        }

        let prompt = self.template.render(snippet);
        let outcome = self.client.complete(&prompt).await;
        let label = outcome.label();

        if let CallOutcome::FallbackUsed { primary_failure, .. } = &outcome {
            tracing::info!(
                primary_status = ?primary_failure.status,
                "Analysis answered by fallback model"
            );
        }

        let raw = match outcome.into_content() {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_analysis(label);
                return Err(e);
            }
        };

        match parse_findings(&raw) {
            Ok(findings) => {
                metrics::record_analysis(label);
                tracing::debug!(findings = findings.len(), path = label, "Analysis complete");
                Ok(findings)
            }
            Err(e) => {
                metrics::record_analysis(match &e {
                    AnalysisError::ResponseMalformed { .. } => "malformed",
                    _ => "schema_invalid",
                });
                tracing::warn!(error = %e, path = label, raw_len = raw.len(), "Model reply rejected");
                Err(e)
            }
        }
    }
}
