//! Admin sessions: login/logout handlers and the bearer-token guard for
//! every `/api/v1/admin` route except login.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::Session;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Rejects the request with 401 unless it carries a token the auth service accepts.
/// The resolved `AuthUser` is added to the request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let user = state.auth.current_user(&token).await.map_err(|e| {
        warn!("Rejected admin request to {}: {e}", req.uri().path());
        AppError::from(e)
    })?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// POST /api/v1/admin/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    let session = state.auth.sign_in(req.email.trim(), &req.password).await?;
    info!("Admin {} signed in", session.user.id);
    Ok(Json(session))
}

/// POST /api/v1/admin/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    state.auth.sign_out(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
