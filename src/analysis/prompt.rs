//! Prompt template.

use std::fs;
use std::path::Path;

/// Placeholder replaced by the snippet.
pub const CODE_PLACEHOLDER: &str = "{{code}}";

const DEFAULT_TEMPLATE: &str = r#"You are a senior application security reviewer.

Review the code below and report every security vulnerability you find.

Respond with a JSON array only, no prose and no markdown fences. Each element must be an object with exactly these keys:
- "line": the 1-based line number where the issue appears (0 if it applies to the whole snippet)
- "issueType": a short name for the vulnerability class, for example "SQL Injection"
- "severity": one of "LOW", "MEDIUM", "HIGH"
- "description": one or two sentences explaining the risk and how to fix it

If there are no vulnerabilities, respond with [].

Code:
```
{{code}}
```"#;

/// Errors raised while loading a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read prompt template: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt template has no {CODE_PLACEHOLDER} placeholder")]
    MissingPlaceholder,
}

/// A prompt template with a single code placeholder.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, TemplateError> {
        let text = text.into();
        if !text.contains(CODE_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder);
        }
        Ok(Self { text })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        Self::new(fs::read_to_string(path)?)
    }

    /// Embed the snippet. Only the first placeholder is replaced, so a
    /// snippet containing the placeholder text is inserted verbatim.
    pub fn render(&self, snippet: &str) -> String {
        self.text.replacen(CODE_PLACEHOLDER, snippet, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_renders_snippet() {
        let prompt = PromptTemplate::default().render("eval(input)");
        assert!(prompt.contains("```\neval(input)\n```"));
        assert!(!prompt.contains(CODE_PLACEHOLDER));
    }

    #[test]
    fn test_snippet_containing_placeholder_is_literal() {
        let template = PromptTemplate::new("A {{code}} B").unwrap();
        assert_eq!(template.render("x {{code}} y"), "A x {{code}} y B");
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        assert!(matches!(
            PromptTemplate::new("no slot here"),
            Err(TemplateError::MissingPlaceholder)
        ));
    }
}
