pub mod follows;
pub mod models;
pub mod pagination;
pub mod posts;
pub mod sessions;
pub mod unit_of_work;
pub mod users;

pub use follows::FollowRepository;
pub use models::{FollowEdge, Post, Session, User};
pub use pagination::Page;
pub use posts::{PostQuery, PostRepository};
pub use sessions::SessionRepository;
pub use unit_of_work::{Record, UnitOfWork};
pub use users::UserRepository;

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::AppError;

/// Open the connection pool described by `config`.
pub async fn connect(config: &Config) -> Result<SqlitePool, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// A private in-memory database with the schema applied.
///
/// One connection only: every new SQLite memory connection is a separate database.
pub async fn memory_pool() -> Result<SqlitePool, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    memory_pool().await.expect("in-memory database")
}
