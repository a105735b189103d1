use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::db::models::{Post, User};
use crate::db::pagination::Page;
use crate::db::unit_of_work::{Record, UnitOfWork};
use crate::error::AppError;
use crate::search::{IndexSynchronizer, Searchable, SearchableModel};

const POST_COLUMNS: &str = "p.id, p.user_id, u.username, p.body, p.timestamp";

/// A not-yet-executed query over posts, newest first.
///
/// Nothing touches the store until `count`, `fetch_page` or `fetch_all` is
/// awaited. Ordering is `timestamp DESC, id DESC`, so posts sharing a timestamp
/// come back in the same order on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    All,
    ByAuthor(String),
    /// Posts by everyone `user_id` follows plus `user_id`'s own posts.
    Followed(String),
}

impl PostQuery {
    pub fn all() -> Self {
        PostQuery::All
    }

    pub fn by_author(user_id: &str) -> Self {
        PostQuery::ByAuthor(user_id.to_string())
    }

    pub fn followed(user_id: &str) -> Self {
        PostQuery::Followed(user_id.to_string())
    }

    fn source(&self) -> String {
        match self {
            PostQuery::All => format!(
                "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id"
            ),
            PostQuery::ByAuthor(_) => format!(
                "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id \
                 WHERE p.user_id = ?"
            ),
            // UNION, not UNION ALL: a post reachable through both branches appears once
            PostQuery::Followed(_) => format!(
                "SELECT {POST_COLUMNS} FROM posts p \
                 JOIN followers f ON f.followed_id = p.user_id \
                 JOIN users u ON u.id = p.user_id \
                 WHERE f.follower_id = ? \
                 UNION \
                 SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id \
                 WHERE p.user_id = ?"
            ),
        }
    }

    fn binds(&self) -> Vec<&str> {
        match self {
            PostQuery::All => Vec::new(),
            PostQuery::ByAuthor(id) => vec![id.as_str()],
            PostQuery::Followed(id) => vec![id.as_str(), id.as_str()],
        }
    }

    pub async fn count(&self, pool: &SqlitePool) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM ({})", self.source());
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in self.binds() {
            query = query.bind(value);
        }
        Ok(query.fetch_one(pool).await?)
    }

    pub async fn fetch_page(
        &self,
        pool: &SqlitePool,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, AppError> {
        let page = Page::<Post>::clamp_page(page);
        let per_page = Page::<Post>::clamp_per_page(per_page);
        let total = self.count(pool).await?;

        let sql = format!(
            "SELECT * FROM ({}) ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            self.source()
        );
        let mut query = sqlx::query_as::<_, Post>(&sql);
        for value in self.binds() {
            query = query.bind(value);
        }
        let items = query
            .bind(per_page)
            .bind(Page::<Post>::offset(page, per_page))
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<Post>, AppError> {
        let sql = format!(
            "SELECT * FROM ({}) ORDER BY timestamp DESC, id DESC",
            self.source()
        );
        let mut query = sqlx::query_as::<_, Post>(&sql);
        for value in self.binds() {
            query = query.bind(value);
        }
        Ok(query.fetch_all(pool).await?)
    }
}

#[async_trait]
impl Record for Post {
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query("INSERT INTO posts (id, user_id, body, timestamp) VALUES (?, ?, ?, ?)")
            .bind(&self.id)
            .bind(&self.user_id)
            .bind(&self.body)
            .bind(self.timestamp)
            .execute(conn)
            .await
            .map_err(|e| AppError::from_write(e, "Post already exists"))?;
        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query("UPDATE posts SET body = ? WHERE id = ?")
            .bind(&self.body)
            .bind(&self.id)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(&self.id)
            .execute(conn)
            .await?;
        Ok(())
    }

    fn as_searchable(&self) -> Option<&dyn Searchable> {
        Some(self)
    }
}

impl Searchable for Post {
    fn collection(&self) -> &'static str {
        Self::COLLECTION
    }

    fn search_id(&self) -> &str {
        &self.id
    }

    fn searchable_fields(&self) -> &'static [&'static str] {
        &["body"]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "body" => Some(self.body.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl SearchableModel for Post {
    const COLLECTION: &'static str = "post";

    async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Self>, AppError> {
        PostQuery::all().fetch_all(pool).await
    }

    async fn fetch_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Self>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        Ok(builder.build_query_as::<Post>().fetch_all(pool).await?)
    }
}

pub struct PostRepository;

impl PostRepository {
    pub async fn create(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        author: &User,
        body: &str,
    ) -> Result<Post, AppError> {
        let post = Post::new(author, body);

        let mut uow = UnitOfWork::new(pool);
        uow.add(post.clone());
        uow.commit(index).await?;

        tracing::debug!("Post {} created by {}", post.id, author.username);
        Ok(post)
    }

    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    pub async fn delete(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        post: Post,
    ) -> Result<(), AppError> {
        let mut uow = UnitOfWork::new(pool);
        uow.delete(post);
        uow.commit(index).await
    }

    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Post>, AppError> {
        <Post as SearchableModel>::fetch_all(pool).await
    }

    pub async fn search(
        pool: &SqlitePool,
        index: &IndexSynchronizer,
        query: &str,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Post>, i64), AppError> {
        index.search::<Post>(pool, query, page, per_page).await
    }

    pub async fn reindex(pool: &SqlitePool, index: &IndexSynchronizer) -> Result<usize, AppError> {
        index.reindex::<Post>(pool).await
    }
}
