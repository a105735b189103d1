use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::{FollowEdge, User};
use crate::db::posts::PostQuery;
use crate::db::unit_of_work::{Record, UnitOfWork};
use crate::error::AppError;
use crate::search::IndexSynchronizer;

#[async_trait]
impl Record for FollowEdge {
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO followers (follower_id, followed_id) VALUES (?, ?)")
            .bind(&self.follower_id)
            .bind(&self.followed_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    // An edge has no columns besides its key
    async fn update(&self, _conn: &mut SqliteConnection) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query("DELETE FROM followers WHERE follower_id = ? AND followed_id = ?")
            .bind(&self.follower_id)
            .bind(&self.followed_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// The follow graph and the feeds derived from it.
pub struct FollowRepository;

impl FollowRepository {
    pub async fn is_following(
        pool: &SqlitePool,
        follower_id: &str,
        followed_id: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM followers WHERE follower_id = ? AND followed_id = ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(pool)
        .await?;

        Ok(exists != 0)
    }

    /// Returns `true` if a new edge was recorded. Following twice is a no-op.
    pub async fn follow(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        follower_id: &str,
        followed_id: &str,
    ) -> Result<bool, AppError> {
        if Self::is_following(pool, follower_id, followed_id).await? {
            return Ok(false);
        }

        let mut uow = UnitOfWork::new(pool);
        uow.add(FollowEdge {
            follower_id: follower_id.to_string(),
            followed_id: followed_id.to_string(),
        });
        uow.commit(index).await?;

        tracing::debug!("{} now follows {}", follower_id, followed_id);
        Ok(true)
    }

    /// Returns `true` if an edge was removed. Unfollowing a stranger is a no-op.
    pub async fn unfollow(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        follower_id: &str,
        followed_id: &str,
    ) -> Result<bool, AppError> {
        if !Self::is_following(pool, follower_id, followed_id).await? {
            return Ok(false);
        }

        let mut uow = UnitOfWork::new(pool);
        uow.delete(FollowEdge {
            follower_id: follower_id.to_string(),
            followed_id: followed_id.to_string(),
        });
        uow.commit(index).await?;

        tracing::debug!("{} unfollowed {}", follower_id, followed_id);
        Ok(true)
    }

    pub async fn followed_count(pool: &SqlitePool, user_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM followers WHERE follower_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn followers_count(pool: &SqlitePool, user_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM followers WHERE followed_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Users `user_id` follows, by username.
    pub async fn followed(pool: &SqlitePool, user_id: &str) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
SELECT u.* FROM users u
JOIN followers f ON f.followed_id = u.id
WHERE f.follower_id = ?
ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    /// Users following `user_id`, by username.
    pub async fn followers(pool: &SqlitePool, user_id: &str) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
SELECT u.* FROM users u
JOIN followers f ON f.follower_id = u.id
WHERE f.followed_id = ?
ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    /// The home feed of `user_id`: own posts plus posts of followed users, newest first.
    pub fn followed_posts(user_id: &str) -> PostQuery {
        PostQuery::followed(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Post;
    use crate::db::{test_pool, PostRepository, UserRepository};

    async fn user(pool: &SqlitePool, name: &str) -> User {
        UserRepository::create(
            pool,
            &IndexSynchronizer::disabled(),
            name,
            &format!("{}@example.com", name),
            "password123",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_follow() {
        let pool = test_pool().await;
        let index = IndexSynchronizer::disabled();
        let john = user(&pool, "john").await;
        let peter = user(&pool, "peter").await;

        assert!(FollowRepository::followed(&pool, &john.id).await.unwrap().is_empty());
        assert!(FollowRepository::followers(&pool, &john.id).await.unwrap().is_empty());

        assert!(FollowRepository::follow(&pool, &index, &john.id, &peter.id).await.unwrap());
        assert!(FollowRepository::is_following(&pool, &john.id, &peter.id).await.unwrap());
        assert!(!FollowRepository::is_following(&pool, &peter.id, &john.id).await.unwrap());
        assert_eq!(FollowRepository::followed_count(&pool, &john.id).await.unwrap(), 1);
        assert_eq!(FollowRepository::followed(&pool, &john.id).await.unwrap()[0].username, "peter");
        assert_eq!(FollowRepository::followers_count(&pool, &peter.id).await.unwrap(), 1);
        assert_eq!(FollowRepository::followers(&pool, &peter.id).await.unwrap()[0].username, "john");

        assert!(FollowRepository::unfollow(&pool, &index, &john.id, &peter.id).await.unwrap());
        assert!(!FollowRepository::is_following(&pool, &john.id, &peter.id).await.unwrap());
        assert_eq!(FollowRepository::followed_count(&pool, &john.id).await.unwrap(), 0);
        assert_eq!(FollowRepository::followers_count(&pool, &peter.id).await.unwrap(), 0);

        // Second unfollow changes nothing and doesn't fail
        assert!(!FollowRepository::unfollow(&pool, &index, &john.id, &peter.id).await.unwrap());
        assert_eq!(FollowRepository::followed_count(&pool, &john.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_follow_twice_is_noop() {
        let pool = test_pool().await;
        let index = IndexSynchronizer::disabled();
        let john = user(&pool, "john").await;
        let peter = user(&pool, "peter").await;

        assert!(FollowRepository::follow(&pool, &index, &john.id, &peter.id).await.unwrap());
        assert!(!FollowRepository::follow(&pool, &index, &john.id, &peter.id).await.unwrap());
        assert_eq!(FollowRepository::followed_count(&pool, &john.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_follow_posts() {
        let pool = test_pool().await;
        let index = IndexSynchronizer::disabled();
        let john = user(&pool, "john").await;
        let susan = user(&pool, "susan").await;
        let mary = user(&pool, "mary").await;
        let david = user(&pool, "david").await;

        let now = chrono::Utc::now().timestamp();
        let mut uow = UnitOfWork::new(&pool);
        let mut posts = Vec::new();
        for (author, offset) in [(&john, 1), (&susan, 4), (&mary, 3), (&david, 2)] {
            let mut post = Post::new(author, &format!("post from {}", author.username));
            post.timestamp = now + offset;
            posts.push(post.clone());
            uow.add(post);
        }
        uow.commit(&index).await.unwrap();
        let [p1, p2, p3, p4] = [&posts[0].id, &posts[1].id, &posts[2].id, &posts[3].id];

        FollowRepository::follow(&pool, &index, &john.id, &susan.id).await.unwrap();
        FollowRepository::follow(&pool, &index, &john.id, &david.id).await.unwrap();
        FollowRepository::follow(&pool, &index, &susan.id, &mary.id).await.unwrap();
        FollowRepository::follow(&pool, &index, &mary.id, &david.id).await.unwrap();

        async fn feed(pool: &SqlitePool, user: &User) -> Vec<String> {
            FollowRepository::followed_posts(&user.id)
                .fetch_all(pool)
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect()
        }

        assert_eq!(feed(&pool, &john).await, vec![p2.clone(), p4.clone(), p1.clone()]);
        assert_eq!(feed(&pool, &susan).await, vec![p2.clone(), p3.clone()]);
        assert_eq!(feed(&pool, &mary).await, vec![p3.clone(), p4.clone()]);
        assert_eq!(feed(&pool, &david).await, vec![p4.clone()]);
    }

    #[tokio::test]
    async fn test_feed_has_no_duplicates_even_with_self_edge() {
        let pool = test_pool().await;
        let index = IndexSynchronizer::disabled();
        let john = user(&pool, "john").await;
        PostRepository::create(&pool, &index, &john, "only once").await.unwrap();

        // The action layer forbids this; the query must still not double count
        FollowRepository::follow(&pool, &index, &john.id, &john.id).await.unwrap();

        let feed = FollowRepository::followed_posts(&john.id);
        assert_eq!(feed.count(&pool).await.unwrap(), 1);
        assert_eq!(feed.fetch_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feed_page_past_end_is_empty() {
        let pool = test_pool().await;
        let john = user(&pool, "john").await;
        PostRepository::create(&pool, &IndexSynchronizer::disabled(), &john, "hello")
            .await
            .unwrap();

        let page = FollowRepository::followed_posts(&john.id)
            .fetch_page(&pool, 5, 3)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert_eq!(page.total, 1);
    }
}
