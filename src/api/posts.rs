use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::api::auth::current_user;
use crate::api::state::AppState;
use crate::db::models::MAX_POST_CHARS;
use crate::db::{FollowRepository, Page, Post, PostQuery, PostRepository};
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        Page::<Post>::clamp_page(self.page.unwrap_or(1))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
}

pub(crate) fn validate_post_body(body: &str) -> Result<String, AppError> {
    let trimmed = body.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        return Err(AppError::Validation("Post cannot be empty".to_string()));
    }
    if len > MAX_POST_CHARS {
        return Err(AppError::Validation(format!(
            "Post must be at most {} characters",
            MAX_POST_CHARS
        )));
    }

    Ok(trimmed.to_string())
}

/// GET /api/feed - own posts plus posts of followed users
pub async fn feed(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = FollowRepository::followed_posts(&user_id)
        .fetch_page(&state.db, params.page(), state.config.posts_per_page)
        .await?;

    Ok(Json(page))
}

/// GET /api/explore - every post
pub async fn explore(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = PostQuery::all()
        .fetch_page(&state.db, params.page(), state.config.posts_per_page)
        .await?;

    Ok(Json(page))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let body = validate_post_body(&req.body)?;
    let author = current_user(&state, &user_id).await?;

    let post = PostRepository::create(&state.db, &state.index, &author, &body).await?;
    Ok(Json(post))
}

/// DELETE /api/posts/{id} - authors may delete their own posts only
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(post_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let post = PostRepository::get_by_id(&state.db, &post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

    if post.user_id != user_id {
        return Err(AppError::Forbidden("You can only delete your own posts".to_string()));
    }

    PostRepository::delete(&state.db, &state.index, post).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// GET /api/search?q=
///
/// Results come back in index rank order. With search disabled the page is empty.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = PageParams { page: params.page }.page();
    let per_page = state.config.posts_per_page;

    let (posts, total) = PostRepository::search(&state.db, &state.index, &params.q, page, per_page).await?;
    Ok(Json(Page::new(posts, page, per_page, total)))
}
