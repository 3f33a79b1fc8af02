//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the scan gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Bearer token and secret hashing settings.
    pub auth: AuthConfig,

    /// External identity provider settings.
    pub oauth: OAuthConfig,

    /// Per-user rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Upstream model provider settings.
    pub analysis: AnalysisConfig,

    /// Shared counter/credential store.
    pub store: StoreConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request body limits.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Token signing and secret hashing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for HS256 session tokens.
    pub jwt_secret: String,

    /// Session token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Argon2 memory cost in KiB.
    pub hash_memory_kib: u32,

    /// Argon2 iteration count.
    pub hash_iterations: u32,

    /// Argon2 lanes.
    pub hash_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: 15 * 60,
            hash_memory_kib: 19_456,
            hash_iterations: 2,
            hash_parallelism: 1,
        }
    }
}

/// OAuth2 authorization-code settings for the Google provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Callback URL registered with the provider.
    pub redirect_url: String,

    /// Where the browser is sent after login (token in the query string).
    pub frontend_url: String,

    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,

    /// Mark the state cookie `Secure`.
    pub secure_cookies: bool,

    /// Timeout for token exchange and userinfo calls in seconds.
    pub request_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: "http://localhost:3000/api/auth/google/callback".to_string(),
            frontend_url: "http://localhost:3001".to_string(),
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_endpoint: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            secure_cookies: false,
            request_timeout_secs: 10,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum scan requests per user per window.
    pub max_requests: u64,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 15,
            window_secs: 900,
        }
    }
}

/// Upstream model provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Chat completions endpoint.
    pub api_url: String,

    pub api_key: String,

    /// Model asked for schema-constrained output.
    pub primary_model: String,

    /// Model used with prefill only when the primary attempt fails.
    pub fallback_model: String,

    /// Per-call timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest accepted snippet in bytes.
    pub max_snippet_bytes: usize,

    /// Optional prompt template file; must contain `{{code}}`.
    pub prompt_template_path: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: String::new(),
            primary_model: "deepseek/deepseek-chat-v3-0324:free".to_string(),
            fallback_model: "mistralai/mistral-7b-instruct:free".to_string(),
            request_timeout_secs: 30,
            max_snippet_bytes: 100 * 1024,
            prompt_template_path: None,
        }
    }
}

/// Shared store configuration.
///
/// Without a Redis URL the gateway keeps counters and credentials in process,
/// which is only correct for a single instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub redis_url: Option<String>,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 75 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "scan_gateway=debug,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 256 * 1024,
        }
    }
}
