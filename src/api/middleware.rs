use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::db::{SessionRepository, UserRepository};
use crate::error::AppError;

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid Authorization format".to_string()))
}

/// Authentication middleware - validates session tokens and records activity
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let session = SessionRepository::get_by_token(&state.db, token)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired session".to_string()))?;

    UserRepository::touch_last_seen(&state.db, &session.user_id).await?;

    // Store user_id in request extensions
    request.extensions_mut().insert(session.user_id);

    Ok(next.run(request).await)
}
