//! Fixed-window rate limiting per authenticated user.
//!
//! The counter lives in the shared [`CounterStore`] so every instance sees
//! the same window. A store failure admits the request.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::AuthenticatedUser;
use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::store::{CounterStore, KeyTtl, StoreResult};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Quota state reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which the window ends.
    pub reset_at: u64,
}

impl Quota {
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_at));
    }
}

/// Decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed(Quota),
    Rejected { quota: Quota, retry_after_secs: u64 },
    /// The store failed; the request is let through.
    Degraded(Quota),
}

impl Admission {
    pub fn quota(&self) -> &Quota {
        match self {
            Admission::Allowed(quota) | Admission::Degraded(quota) => quota,
            Admission::Rejected { quota, .. } => quota,
        }
    }

    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected { .. })
    }
}

/// Per-user fixed-window limiter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u64,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u64, window_secs: u64) -> Self {
        Self {
            store,
            max_requests,
            window_secs,
        }
    }

    pub fn from_config(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self::new(store, config.max_requests, config.window_secs)
    }

    pub fn key(subject_id: u64) -> String {
        format!("rate:{subject_id}")
    }

    /// Count one request for `subject_id` and decide whether it may proceed.
    pub async fn admit(&self, subject_id: u64) -> Admission {
        let key = Self::key(subject_id);
        let now = unix_now();

        let (count, ttl) = match self.count(&key).await {
            Ok(observed) => observed,
            Err(e) => {
                tracing::warn!(user_id = subject_id, error = %e, "Rate limiter degraded");
                metrics::record_rate_limiter_degraded();
                return Admission::Degraded(Quota {
                    limit: self.max_requests,
                    remaining: self.max_requests,
                    reset_at: now + self.window_secs,
                });
            }
        };

        let quota = Quota {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(count),
            reset_at: now + ttl,
        };

        if count <= self.max_requests {
            Admission::Allowed(quota)
        } else {
            Admission::Rejected {
                quota,
                retry_after_secs: ttl.max(1),
            }
        }
    }

    /// INCR, then TTL, then EXPIRE only when the key carries no expiry.
    async fn count(&self, key: &str) -> StoreResult<(u64, u64)> {
        let count = self.store.incr(key).await?;
        let ttl = match self.store.ttl(key).await? {
            KeyTtl::Remaining(secs) => secs,
            KeyTtl::Persistent | KeyTtl::Missing => {
                self.store.expire(key, self.window_secs).await?;
                self.window_secs
            }
        };
        Ok((count, ttl))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Middleware enforcing the limiter. Must run after authentication.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user_id) = request.extensions().get::<AuthenticatedUser>().map(|u| u.id) else {
        return ApiError::Unauthenticated.into_response();
    };

    match limiter.admit(user_id).await {
        Admission::Rejected {
            quota,
            retry_after_secs,
        } => {
            tracing::warn!(user_id, retry_after_secs, "Rate limit exceeded");
            metrics::record_rate_limited();
            let mut response = ApiError::RateLimited { retry_after_secs }.into_response();
            quota.apply_headers(response.headers_mut());
            response
        }
        admitted => {
            let mut response = next.run(request).await;
            admitted.quota().apply_headers(response.headers_mut());
            response
        }
    }
}
