//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, CORS, timeout, body limit)
//!     → request.rs (span fields, per-route metrics)
//!     → public routes: health.rs, auth.rs (login redirect + callback)
//!     → middleware/authenticate.rs (bearer token → AuthenticatedUser)
//!     → security::rate_limit (scan route only)
//!     → scan.rs (validate body, run analysis)
//!     → error.rs (ApiError → JSON body)
//! ```

pub mod auth;
pub mod error;
pub mod health;
pub mod middleware;
pub mod request;
pub mod scan;
pub mod server;

pub use error::ApiError;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
