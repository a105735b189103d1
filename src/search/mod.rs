//! Full-text search over searchable entities.
//!
//! The relational store stays authoritative; the index is a rebuildable mirror.
//!
//! - [`Searchable`] is the capability an entity implements to take part in indexing:
//!   a collection name, an identifier and the names of its searchable fields.
//! - [`SearchIndex`] is the external backend (Elasticsearch over HTTP, or the
//!   in-process [`MemoryIndex`]).
//! - [`IndexSynchronizer`] mirrors committed changes into the backend and answers
//!   queries, degrading to empty results when no backend is reachable.

pub mod elasticsearch;
pub mod memory;
pub mod synchronizer;
pub mod tokenizer;

pub use elasticsearch::ElasticsearchIndex;
pub use memory::MemoryIndex;
pub use synchronizer::{ChangeKind, ChangeSet, IndexSynchronizer};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::Config;
use crate::error::AppError;

/// Field name to value, as sent to the index.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub const MEMORY_INDEX_URL: &str = "memory://";

pub trait Searchable: Send + Sync {
    fn collection(&self) -> &'static str;

    fn search_id(&self) -> &str;

    fn searchable_fields(&self) -> &'static [&'static str];

    fn field_value(&self, field: &str) -> Option<String>;

    fn to_document(&self) -> Document {
        self.searchable_fields()
            .iter()
            .filter_map(|field| {
                self.field_value(field)
                    .map(|value| (field.to_string(), serde_json::Value::String(value)))
            })
            .collect()
    }
}

/// A persisted [`Searchable`] type the synchronizer can rebuild and re-hydrate.
#[async_trait]
pub trait SearchableModel: Searchable + Sized {
    const COLLECTION: &'static str;

    async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Self>, AppError>;

    async fn fetch_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Self>, AppError>;
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub ids: Vec<String>,
    pub total: i64,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn ping(&self) -> bool;

    async fn index(&self, collection: &str, id: &str, document: &Document) -> Result<(), SearchError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SearchError>;

    async fn search(
        &self,
        collection: &str,
        query: &str,
        offset: i64,
        limit: i64,
    ) -> Result<SearchHits, SearchError>;
}

/// Build the backend named by `SEARCH_URL`, or `None` when search is disabled.
pub fn connect(config: &Config) -> Result<Option<Arc<dyn SearchIndex>>, AppError> {
    if !config.search_enabled() {
        return Ok(None);
    }

    let url = config.search_url.trim();
    if url == MEMORY_INDEX_URL {
        return Ok(Some(Arc::new(MemoryIndex::new())));
    }

    let backend = ElasticsearchIndex::new(url, Duration::from_secs(config.search_timeout_secs))?;
    Ok(Some(Arc::new(backend)))
}
