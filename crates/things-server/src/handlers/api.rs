//! JSON API handlers

use crate::services::auth::AuthError;
use crate::AppState;
use axum::{
    extract::State,
    http::header::HeaderMap,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use things_core::{Capability, Thing};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("Capability not granted: {0}")]
    Forbidden(Capability),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::MissingCapability(cap) => ApiError::Forbidden(cap),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(err) => {
                tracing::error!("API request failed: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn authorize(state: &AppState, headers: &HeaderMap, cap: Capability) -> Result<(), ApiError> {
    let token = extract_token(headers).ok_or(ApiError::Unauthorized)?;
    state.auth.authorize(token, cap)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct InsertRequest {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

/// `POST /api/v1/insert` - requires the `edit` capability.
///
/// A missing `name` field is acknowledged, not an error; an empty one
/// is silently ignored by the store. Both match the original surface.
pub async fn insert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<InsertRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    authorize(&state, &headers, Capability::Edit)?;

    let Some(name) = req.name else {
        return Ok(Json(MessageResponse {
            message: "Name not provided.",
        }));
    };

    state.store.insert(&name).await?;

    Ok(Json(MessageResponse {
        message: "Data inserted successfully.",
    }))
}

/// `GET /api/v1/select` - requires the `read` capability.
///
/// Always returns the full table; query parameters are ignored and
/// consumers filter client-side.
pub async fn select(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Thing>>, ApiError> {
    authorize(&state, &headers, Capability::Read)?;

    let things = state.store.list(None).await?;
    Ok(Json(things))
}
