use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::{current_user, validate_username, UserResponse};
use crate::api::posts::PageParams;
use crate::api::state::AppState;
use crate::db::models::MAX_ABOUT_ME_CHARS;
use crate::db::{FollowRepository, Page, Post, PostQuery, User, UserRepository};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub followers_count: i64,
    pub followed_count: i64,
    pub is_following: bool,
    pub is_self: bool,
    pub posts: Page<Post>,
}

#[derive(Debug, Deserialize)]
pub struct EditProfileRequest {
    pub username: String,
    #[serde(default)]
    pub about_me: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub username: String,
    pub following: bool,
    /// False when the request didn't change anything.
    pub changed: bool,
}

async fn find_user(state: &AppState, username: &str) -> Result<User, AppError> {
    let username = username.trim().to_lowercase();
    UserRepository::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found.", username)))
}

/// GET /api/users/{username}
pub async fn profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = find_user(&state, &username).await?;

    let posts = PostQuery::by_author(&user.id)
        .fetch_page(&state.db, params.page(), state.config.posts_per_page)
        .await?;

    Ok(Json(ProfileResponse {
        followers_count: FollowRepository::followers_count(&state.db, &user.id).await?,
        followed_count: FollowRepository::followed_count(&state.db, &user.id).await?,
        is_following: FollowRepository::is_following(&state.db, &user_id, &user.id).await?,
        is_self: user.id == user_id,
        user: UserResponse::from(&user),
        posts,
    }))
}

/// PUT /api/profile
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(req): Json<EditProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let mut user = current_user(&state, &user_id).await?;
    let username = validate_username(&req.username)?;

    if username != user.username
        && UserRepository::get_by_username(&state.db, &username).await?.is_some()
    {
        return Err(AppError::Conflict("Please use a different username.".to_string()));
    }

    let about_me = req
        .about_me
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    if let Some(text) = &about_me {
        if text.chars().count() > MAX_ABOUT_ME_CHARS {
            return Err(AppError::Validation(format!(
                "About me must be at most {} characters",
                MAX_ABOUT_ME_CHARS
            )));
        }
    }

    user.username = username;
    user.about_me = about_me;
    UserRepository::save(&state.db, &state.index, &user).await?;

    tracing::debug!("Profile of {} updated", user.id);
    Ok(Json(UserResponse::from(&user)))
}

/// GET /api/users/{username}/followers
pub async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let user = find_user(&state, &username).await?;
    let users = FollowRepository::followers(&state.db, &user.id).await?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// GET /api/users/{username}/followed
pub async fn followed(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let user = find_user(&state, &username).await?;
    let users = FollowRepository::followed(&state.db, &user.id).await?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// POST /api/follow/{username}
pub async fn follow(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(username): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    let target = find_user(&state, &username).await?;
    if target.id == user_id {
        return Err(AppError::Validation("You cannot follow yourself!".to_string()));
    }

    let changed = FollowRepository::follow(&state.db, &state.index, &user_id, &target.id).await?;

    Ok(Json(FollowResponse {
        username: target.username,
        following: true,
        changed,
    }))
}

/// POST /api/unfollow/{username}
pub async fn unfollow(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(username): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    let target = find_user(&state, &username).await?;
    if target.id == user_id {
        return Err(AppError::Validation("You cannot unfollow yourself!".to_string()));
    }

    let changed = FollowRepository::unfollow(&state.db, &state.index, &user_id, &target.id).await?;

    Ok(Json(FollowResponse {
        username: target.username,
        following: false,
        changed,
    }))
}
