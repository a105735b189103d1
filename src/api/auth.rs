use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::bearer_token;
use crate::api::state::AppState;
use crate::db::{SessionRepository, User, UserRepository};
use crate::error::AppError;
use crate::mail::send_password_reset_email;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 120;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: i64,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequestBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordBody {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub about_me: Option<String>,
    pub avatar: String,
    pub last_seen: i64,
    pub created_at: i64,
}

const AVATAR_SIZE: u32 = 128;

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            username: user.username.clone(),
            about_me: user.about_me.clone(),
            avatar: user.avatar_url(AVATAR_SIZE),
            last_seen: user.last_seen,
            created_at: user.created_at,
        }
    }
}

/// The signed-in user's own view, which includes the email address.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub email: String,
}

/// Validate and sanitize username
pub(crate) fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();

    if trimmed.len() < 3 || trimmed.len() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be 3-{} characters",
            MAX_USERNAME_LEN
        )));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::Validation(
            "Username must be alphanumeric, underscore, or hyphen".to_string(),
        ));
    }

    // Convert to lowercase for consistency
    Ok(trimmed.to_lowercase())
}

pub(crate) fn validate_email(email: &str) -> Result<String, AppError> {
    let trimmed = email.trim();
    let invalid = || AppError::Validation("Invalid email address".to_string());

    if trimmed.is_empty() || trimmed.len() > MAX_EMAIL_LEN || trimmed.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(trimmed.to_lowercase())
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Load the user a verified session belongs to.
pub(crate) async fn current_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
    UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".to_string()))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MeResponse>, AppError> {
    let username = validate_username(&req.username)?;
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;

    if UserRepository::get_by_username(&state.db, &username).await?.is_some() {
        return Err(AppError::Conflict("Please use a different username.".to_string()));
    }
    if UserRepository::get_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Conflict("Please use a different email address.".to_string()));
    }

    let user = UserRepository::create(&state.db, &state.index, &username, &email, &req.password).await?;

    Ok(Json(MeResponse {
        user: UserResponse::from(&user),
        email: user.email,
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Auth("Invalid username or password".to_string());

    let username = validate_username(&req.username).map_err(|_| invalid())?;
    let user = UserRepository::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(invalid)?;

    if !user.check_password(&req.password) {
        tracing::debug!("Failed login for {}", username);
        return Err(invalid());
    }

    let session = SessionRepository::create(
        &state.db,
        &user.id,
        state.config.session_expiry_hours,
    ).await?;

    Ok(Json(LoginResponse {
        session_token: session.token,
        expires_at: session.expires_at,
        user: UserResponse::from(&user),
    }))
}

/// POST /api/auth/logout (requires auth)
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = bearer_token(&headers)?;
    SessionRepository::delete(&state.db, token).await?;

    Ok(Json(serde_json::json!({"success": true})))
}

/// GET /api/auth/me (requires auth via middleware)
pub async fn me(
    State(state): State<AppState>,
    axum::Extension(user_id): axum::Extension<String>,
) -> Result<Json<MeResponse>, AppError> {
    let user = current_user(&state, &user_id).await?;

    Ok(Json(MeResponse {
        user: UserResponse::from(&user),
        email: user.email,
    }))
}

/// POST /api/auth/reset_password_request
///
/// Answers the same way whether or not the address is registered.
pub async fn reset_password_request(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequestBody>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = req.email.trim().to_lowercase();

    if let Some(user) = UserRepository::get_by_email(&state.db, &email).await? {
        let token = state.tokens.issue(&user.id)?;
        send_password_reset_email(&state.mailer, &state.config, &user, &token, state.tokens.ttl_secs());
        tracing::info!("Password reset requested for {}", user.username);
    }

    Ok(Json(MessageResponse {
        message: "Check your email for the instructions to reset your password".to_string(),
    }))
}

/// POST /api/auth/reset_password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordBody>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut user = UserRepository::verify_reset_password_token(&state.db, &state.tokens, &req.token)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired token".to_string()))?;

    validate_password(&req.password)?;
    user.set_password(&req.password)?;
    UserRepository::save(&state.db, &state.index, &user).await?;

    // Existing sessions were opened with the old password
    SessionRepository::delete_for_user(&state.db, &user.id).await?;

    tracing::info!("Password reset for {}", user.username);
    Ok(Json(MessageResponse {
        message: "Your password has been reset.".to_string(),
    }))
}
