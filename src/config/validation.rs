//! Configuration validation.
//!
//! Serde handles syntax; this pass checks value ranges and required secrets.
//! All problems are reported together, not just the first.

use std::fmt;

use crate::config::schema::ServiceConfig;

/// Smallest accepted HMAC key for session tokens.
const MIN_JWT_SECRET_LEN: usize = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
        errors.push(ValidationError::new(
            "auth.jwt_secret",
            format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
        ));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be > 0"));
    }
    if config.auth.hash_iterations == 0 || config.auth.hash_parallelism == 0 {
        errors.push(ValidationError::new(
            "auth.hash_iterations",
            "iterations and parallelism must be > 0",
        ));
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }

    if config.analysis.api_key.is_empty() {
        errors.push(ValidationError::new("analysis.api_key", "must be set"));
    }
    if config.analysis.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "analysis.request_timeout_secs",
            "must be > 0",
        ));
    }
    if config.analysis.max_snippet_bytes == 0 {
        errors.push(ValidationError::new("analysis.max_snippet_bytes", "must be > 0"));
    }
    if config.security.max_body_bytes < config.analysis.max_snippet_bytes {
        errors.push(ValidationError::new(
            "security.max_body_bytes",
            "must not be smaller than analysis.max_snippet_bytes",
        ));
    }

    for (field, value) in [
        ("analysis.api_url", &config.analysis.api_url),
        ("oauth.redirect_url", &config.oauth.redirect_url),
        ("oauth.frontend_url", &config.oauth.frontend_url),
        ("oauth.authorization_endpoint", &config.oauth.authorization_endpoint),
        ("oauth.token_endpoint", &config.oauth.token_endpoint),
        ("oauth.userinfo_endpoint", &config.oauth.userinfo_endpoint),
    ] {
        if let Err(e) = url::Url::parse(value) {
            errors.push(ValidationError::new(field, format!("invalid URL: {e}")));
        }
    }

    if let Some(redis_url) = &config.store.redis_url {
        if !redis_url.starts_with("redis://") && !redis_url.starts_with("rediss://") {
            errors.push(ValidationError::new(
                "store.redis_url",
                "must use the redis:// or rediss:// scheme",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
