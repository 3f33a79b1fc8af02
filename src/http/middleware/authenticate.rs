//! Bearer authentication middleware.
//! Attaches the [`AuthenticatedUser`] to request extensions.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{bearer_token, AuthenticatedUser, Authenticator};
use crate::http::error::ApiError;

pub async fn authenticate_middleware(
    State(authenticator): State<Arc<Authenticator>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let Some(token) = token else {
        return ApiError::Unauthenticated.into_response();
    };

    match authenticator.authenticate(&token).await {
        Ok(user) => {
            tracing::Span::current().record("user_id", user.id);
            req.extensions_mut().insert::<AuthenticatedUser>(user);
            next.run(req).await
        }
        Err(_) => ApiError::Unauthenticated.into_response(),
    }
}
