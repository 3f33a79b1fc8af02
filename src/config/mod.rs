//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is read-only once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Secrets come from the environment so config files can be committed

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AnalysisConfig, AuthConfig, ListenerConfig, OAuthConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, ServiceConfig, StoreConfig, TimeoutConfig,
};
