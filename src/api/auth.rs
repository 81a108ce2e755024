use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use super::extract::ApiJson;
use crate::auth::AuthError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Admin login endpoint
///
/// POST /api/admin/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let issued = state.auth.login(&request.password).map_err(|e| match e {
        AuthError::Signing(msg) => ApiError::internal(format!("Failed to generate token: {}", msg)),
        other => {
            warn!("Admin login rejected");
            other.into()
        }
    })?;

    info!(expires_at = %issued.expires_at, "Admin logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Auth middleware for admin routes. Rejected requests never reach the
/// wrapped handler.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    state.auth.authenticate(header)?;

    Ok(next.run(request).await)
}
