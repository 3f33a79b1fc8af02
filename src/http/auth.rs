//! Login and identity handlers.
//!
//! # Flow
//! ```text
//! GET /api/auth/google
//!     → random state in an HttpOnly cookie
//!     → 302 to the provider
//! GET /api/auth/google/callback?code&state
//!     → state checked against the cookie
//!     → code exchanged for an ExternalIdentity
//!     → SessionRotation::login (find/create, rotate secret)
//!     → token issued, 302 to {frontend_url}/?accessToken=<jwt>
//! ```
//! Any failure sends the browser to `{frontend_url}/?error=login_failed`.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::auth::{AuthenticatedUser, ProviderError, RotationError, TokenError};
use crate::http::server::AppState;
use crate::observability::metrics;

pub const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/api/auth";
const STATE_BYTES: usize = 16;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Error)]
enum LoginError {
    #[error("state parameter does not match cookie")]
    StateMismatch,

    #[error("provider returned error: {0}")]
    Denied(String),

    #[error("callback has no authorization code")]
    MissingCode,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

fn random_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn state_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(STATE_COOKIE_PATH)
        .max_age(time::Duration::minutes(10))
        .build()
}

fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, ""))
        .path(STATE_COOKIE_PATH)
        .max_age(time::Duration::ZERO)
        .build()
}

/// 302 with the jar's cookie changes applied.
fn found(jar: CookieJar, location: String) -> Response {
    (StatusCode::FOUND, jar, [(header::LOCATION, location)]).into_response()
}

fn state_matches(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

/// `GET /api/auth/google`
pub async fn start_login(State(state): State<AppState>, jar: CookieJar) -> Response {
    let oauth_state = random_state();
    let location = state.provider.authorization_url(&oauth_state);
    let jar = jar.add(state_cookie(oauth_state, state.config.oauth.secure_cookies));

    tracing::debug!(provider = state.provider.name(), "Starting external login");
    found(jar, location)
}

/// `GET /api/auth/google/callback`
pub async fn finish_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(clear_state_cookie());
    let frontend = state.config.oauth.frontend_url.trim_end_matches('/');

    match complete_login(&state, expected.as_deref(), params).await {
        Ok(token) => {
            metrics::record_login("success");
            found(
                jar,
                format!("{frontend}/?accessToken={}", urlencoding::encode(&token)),
            )
        }
        Err(e) => {
            tracing::warn!(provider = state.provider.name(), error = %e, "Login failed");
            metrics::record_login("failure");
            found(jar, format!("{frontend}/?error=login_failed"))
        }
    }
}

async fn complete_login(
    state: &AppState,
    expected_state: Option<&str>,
    params: CallbackParams,
) -> Result<String, LoginError> {
    if let Some(error) = params.error {
        return Err(LoginError::Denied(error));
    }

    match (expected_state, params.state.as_deref()) {
        (Some(expected), Some(actual)) if state_matches(expected, actual) => {}
        _ => return Err(LoginError::StateMismatch),
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(LoginError::MissingCode)?;

    let identity = state.provider.authenticate(&code).await?;
    let outcome = state.rotation.login(&identity).await?;
    let token = state.tokens.issue(outcome.user_id, outcome.secret.expose())?;

    tracing::info!(
        user_id = outcome.user_id,
        created = outcome.created,
        "User logged in"
    );
    Ok(token)
}

/// `GET /api/auth/user`
pub async fn current_user(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}
