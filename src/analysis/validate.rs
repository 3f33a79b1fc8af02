//! Parsing and validation of model replies.
//!
//! Validation walks the JSON value by hand instead of deserializing straight
//! into [`Finding`] so that every failing field is reported, not just the
//! first one serde trips over. Unknown keys are ignored.

use serde_json::{Map, Value};

use crate::analysis::types::{AnalysisError, Finding, Severity};

/// Trim the reply and strip a markdown fence if present.
pub fn strip_fence(raw: &str) -> &str {
    let text = raw.trim();
    match text.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => text,
    }
}

/// Parse a raw reply into validated findings.
///
/// Providers differ on whether the seeded `[` is echoed back. A reply that
/// is valid JSON on its own is taken as-is; otherwise the prefill is
/// restored and the text parsed again.
pub fn parse_findings(raw: &str) -> Result<Vec<Finding>, AnalysisError> {
    let text = strip_fence(raw);
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(&format!("[{text}"))
            .map_err(|e| AnalysisError::malformed(e.to_string()))?,
    };
    validate_findings(&value)
}

/// Validate a parsed value as an array of findings.
pub fn validate_findings(value: &Value) -> Result<Vec<Finding>, AnalysisError> {
    let Value::Array(items) = value else {
        return Err(AnalysisError::schema_invalid(vec![
            "$: expected array".to_string(),
        ]));
    };

    let mut findings = Vec::with_capacity(items.len());
    let mut errors = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            errors.push(format!("[{i}]: expected object"));
            continue;
        };

        let line = line_number(obj.get("line"));
        if line.is_none() {
            errors.push(format!("[{i}].line: expected non-negative integer"));
        }

        let issue_type = non_empty_string(obj, "issueType");
        if issue_type.is_none() {
            errors.push(format!("[{i}].issueType: expected non-empty string"));
        }

        let severity = obj
            .get("severity")
            .and_then(Value::as_str)
            .and_then(Severity::from_wire);
        if severity.is_none() {
            errors.push(format!(
                "[{i}].severity: expected one of {}",
                Severity::NAMES.join(", ")
            ));
        }

        let description = non_empty_string(obj, "description");
        if description.is_none() {
            errors.push(format!("[{i}].description: expected non-empty string"));
        }

        if let (Some(line), Some(issue_type), Some(severity), Some(description)) =
            (line, issue_type, severity, description)
        {
            findings.push(Finding {
                line,
                issue_type,
                severity,
                description,
            });
        }
    }

    if errors.is_empty() {
        Ok(findings)
    } else {
        Err(AnalysisError::schema_invalid(errors))
    }
}

/// Accepts integral JSON numbers, including ones written as `3.0`.
fn line_number(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn non_empty_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
