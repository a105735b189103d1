use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::crypto::ResetTokenSigner;
use crate::db::models::User;
use crate::db::posts::PostQuery;
use crate::db::unit_of_work::{Record, UnitOfWork};
use crate::error::AppError;
use crate::search::IndexSynchronizer;

const USER_CONFLICT: &str = "Username or email already in use";

#[async_trait]
impl Record for User {
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query(
            r#"
INSERT INTO users (id, username, email, password_hash, password_salt, about_me, last_seen, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.username)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(&self.password_salt)
        .bind(&self.about_me)
        .bind(self.last_seen)
        .bind(self.created_at)
        .execute(conn)
        .await
        .map_err(|e| AppError::from_write(e, USER_CONFLICT))?;

        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query(
            r#"
UPDATE users
SET username = ?, email = ?, password_hash = ?, password_salt = ?, about_me = ?, last_seen = ?
WHERE id = ?
            "#,
        )
        .bind(&self.username)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(&self.password_salt)
        .bind(&self.about_me)
        .bind(self.last_seen)
        .bind(&self.id)
        .execute(conn)
        .await
        .map_err(|e| AppError::from_write(e, USER_CONFLICT))?;

        Ok(())
    }

    async fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&self.id)
            .execute(conn)
            .await?;

        Ok(())
    }
}

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let user = User::new(username.to_string(), email.to_string(), password)?;

        let mut uow = UnitOfWork::new(pool);
        uow.add(user.clone());
        uow.commit(index).await?;

        tracing::info!("User {} registered", user.username);
        Ok(user)
    }

    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    /// Persist every mutable column of `user` (profile edits, password changes).
    pub async fn save(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        user: &User,
    ) -> Result<(), AppError> {
        let mut uow = UnitOfWork::new(pool);
        uow.update(user.clone());
        uow.commit(index).await
    }

    /// Single-statement bump of `last_seen`, run on every authenticated request.
    pub async fn touch_last_seen(pool: &SqlitePool, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Delete the account and its posts, keeping the search index in step.
    pub async fn delete(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        user: User,
    ) -> Result<(), AppError> {
        let posts = PostQuery::by_author(&user.id).fetch_all(pool).await?;

        let mut uow = UnitOfWork::new(pool);
        for post in posts {
            uow.delete(post);
        }
        uow.delete(user);
        uow.commit(index).await
    }

    /// The user a reset token was issued for, or `None` for any token that
    /// doesn't check out, including one for an account that no longer exists.
    pub async fn verify_reset_password_token(
        pool: &SqlitePool,
        signer: &ResetTokenSigner,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(user_id) = signer.verify(token) else {
            return Ok(None);
        };

        Self::get_by_id(pool, &user_id).await
    }
}
