//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Authenticated request (AuthenticatedUser in extensions):
//!     → rate_limit.rs (INCR/TTL/EXPIRE on rate:{user_id})
//!     → Allowed / Degraded: pass to handler, add X-RateLimit-* headers
//!     → Rejected: 429 with Retry-After
//! ```
//!
//! # Design Decisions
//! - Limits are keyed by user id, never by IP
//! - Fail open: a store outage must not take the scan endpoint down

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, Admission, Quota, RateLimiter};
