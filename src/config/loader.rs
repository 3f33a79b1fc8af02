//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay secrets and deployment-specific values from the environment.
///
/// `lookup` is injected so tests do not depend on process-wide state.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SCAN_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("SCAN_JWT_SECRET") {
        config.auth.jwt_secret = v;
    }
    if let Some(v) = lookup("SCAN_LLM_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY")) {
        config.analysis.api_key = v;
    }
    if let Some(v) = lookup("SCAN_OAUTH_CLIENT_ID") {
        config.oauth.client_id = v;
    }
    if let Some(v) = lookup("SCAN_OAUTH_CLIENT_SECRET") {
        config.oauth.client_secret = v;
    }
    if let Some(v) = lookup("SCAN_FRONTEND_URL") {
        config.oauth.frontend_url = v;
    }
    if let Some(v) = lookup("SCAN_REDIS_URL") {
        config.store.redis_url = Some(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_secrets() {
        let env: HashMap<&str, &str> = [
            ("SCAN_JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("SCAN_REDIS_URL", "redis://cache:6379"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.auth.jwt_secret, "0123456789abcdef0123456789abcdef");
        assert_eq!(config.analysis.api_key, "sk-or-test");
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_specific_key_wins_over_provider_key() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |k| match k {
            "SCAN_LLM_API_KEY" => Some("specific".to_string()),
            "OPENROUTER_API_KEY" => Some("generic".to_string()),
            _ => None,
        });
        assert_eq!(config.analysis.api_key, "specific");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/scan-gateway.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
