use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

use crate::crypto::{generate_salt, hash_password, verify_password};
use crate::error::AppError;

pub const MAX_POST_CHARS: usize = 140;
pub const MAX_ABOUT_ME_CHARS: usize = 140;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Vec<u8>,
    #[serde(skip_serializing)]
    pub password_salt: Vec<u8>,
    pub about_me: Option<String>,
    pub last_seen: i64,
    pub created_at: i64,
}

impl User {
    pub fn new(username: String, email: String, password: &str) -> Result<Self, AppError> {
        let now = chrono::Utc::now().timestamp();
        let mut user = User {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash: Vec::new(),
            password_salt: Vec::new(),
            about_me: None,
            last_seen: now,
            created_at: now,
        };
        user.set_password(password)?;
        Ok(user)
    }

    /// Replace the stored credential with a freshly salted hash of `password`.
    pub fn set_password(&mut self, password: &str) -> Result<(), AppError> {
        let salt = generate_salt();
        let hash = hash_password(password, &salt)?;
        self.password_hash = hash.to_vec();
        self.password_salt = salt.to_vec();
        Ok(())
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash, &self.password_salt).unwrap_or(false)
    }

    /// Gravatar URL for the account's email, `size` pixels square.
    pub fn avatar_url(&self, size: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.email.trim().to_lowercase().as_bytes());
        format!(
            "https://www.gravatar.com/avatar/{:x}?d=identicon&s={}",
            hasher.finalize(),
            size
        )
    }
}

/// A post as read back from the store, with its author's username joined in.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub body: String,
    pub timestamp: i64,
}

impl Post {
    pub fn new(author: &User, body: &str) -> Self {
        Post {
            id: Uuid::new_v4().to_string(),
            user_id: author.id.clone(),
            username: author.username.clone(),
            body: body.trim().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// `follower_id` follows `followed_id`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FollowEdge {
    pub follower_id: String,
    pub followed_id: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
    pub created_at: i64,
}
