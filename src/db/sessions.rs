use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use crate::db::models::Session;
use crate::error::AppError;

/// Bearer sessions handed out at login.
pub struct SessionRepository;

impl SessionRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        expiry_hours: i64,
    ) -> Result<Session, AppError> {
        let id = Uuid::new_v4().to_string();
        let token = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();
        let expires_at = created_at + (expiry_hours * 3600);

        let session = sqlx::query_as::<_, Session>(
            r#"
INSERT INTO sessions (id, user_id, token, expires_at, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn get_by_token(
        pool: &Pool<Sqlite>,
        token: &str,
    ) -> Result<Option<Session>, AppError> {
        let now = chrono::Utc::now().timestamp();

        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE token = ? AND expires_at > ?"
        )
        .bind(token)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    pub async fn delete(
        pool: &Pool<Sqlite>,
        token: &str,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Drop every session of a user, e.g. after a password reset.
    pub async fn delete_for_user(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, UserRepository};
    use crate::search::IndexSynchronizer;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let pool = test_pool().await;
        let user = UserRepository::create(
            &pool,
            &IndexSynchronizer::disabled(),
            "john",
            "john@example.com",
            "password123",
        )
        .await
        .unwrap();

        let session = SessionRepository::create(&pool, &user.id, 24).await.unwrap();
        let found = SessionRepository::get_by_token(&pool, &session.token).await.unwrap().unwrap();
        assert_eq!(found.user_id, user.id);

        SessionRepository::delete(&pool, &session.token).await.unwrap();
        assert!(SessionRepository::get_by_token(&pool, &session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_ignored_and_cleaned() {
        let pool = test_pool().await;
        let user = UserRepository::create(
            &pool,
            &IndexSynchronizer::disabled(),
            "john",
            "john@example.com",
            "password123",
        )
        .await
        .unwrap();

        let expired = SessionRepository::create(&pool, &user.id, -1).await.unwrap();
        let live = SessionRepository::create(&pool, &user.id, 1).await.unwrap();

        assert!(SessionRepository::get_by_token(&pool, &expired.token).await.unwrap().is_none());
        assert_eq!(SessionRepository::cleanup_expired(&pool).await.unwrap(), 1);
        assert_eq!(SessionRepository::delete_for_user(&pool, &user.id).await.unwrap(), 1);
        assert!(SessionRepository::get_by_token(&pool, &live.token).await.unwrap().is_none());
    }
}
