use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::analysis::Finding;
use crate::auth::AuthenticatedUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Where the snippet came from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Raw,
    Gist,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScanRequest {
    pub source: ScanSource,
    pub content: String,
}

/// `POST /api/scan`
pub async fn scan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<Vec<Finding>>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            tracing::warn!(user_id = user.id, error = %rejection.body_text(), "Invalid scan request");
            ApiError::RequestMalformed(rejection.body_text())
        }
    })?;

    if request.content.trim().is_empty() {
        return Err(ApiError::RequestMalformed(
            "content must not be empty".to_string(),
        ));
    }
    if request.content.len() > state.config.analysis.max_snippet_bytes {
        tracing::warn!(user_id = user.id, bytes = request.content.len(), "Snippet too large");
        return Err(ApiError::PayloadTooLarge);
    }

    tracing::info!(
        user_id = user.id,
        source = ?request.source,
        bytes = request.content.len(),
        "Scan request received"
    );

    let findings = state.pipeline.analyze(&request.content).await?;
    Ok(Json(findings))
}
