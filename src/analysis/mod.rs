//! Code analysis subsystem.
//!
//! # Data Flow
//! ```text
//! Snippet (from POST /api/scan)
//!     → pipeline.rs (size check)
//!     → prompt.rs (embed snippet in template)
//!     → client.rs (primary model with schema + prefill,
//!                  fallback model with prefill only)
//!     → validate.rs (restore prefill, parse JSON, check every field)
//!     → Vec<Finding> or AnalysisError
//! ```
//!
//! # Design Decisions
//! - Exactly one fallback attempt, no retries of the same model
//! - Model output is untrusted: nothing reaches the client before validation
//! - Provider error bodies stay in server logs

pub mod client;
pub mod pipeline;
pub mod prompt;
pub mod types;
pub mod validate;

pub use client::{CallOutcome, ModelClient, UpstreamFailure};
pub use pipeline::AnalysisPipeline;
pub use prompt::{PromptTemplate, TemplateError};
pub use types::{AnalysisError, AnalysisErrorKind, Finding, Severity};
