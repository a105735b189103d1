use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;

use super::{Document, SearchIndex, Searchable, SearchableModel};
use crate::db::Page;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct PendingDocument {
    collection: &'static str,
    id: String,
    document: Document,
}

/// Snapshot of the searchable side of a transaction, taken before it commits.
#[derive(Debug, Default)]
pub struct ChangeSet {
    upserts: Vec<PendingDocument>,
    removals: Vec<(&'static str, String)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.len()
    }

    pub fn removal_count(&self) -> usize {
        self.removals.len()
    }
}

/// Keeps the search index in step with the relational store.
///
/// Every backend call is guarded: with no backend configured the synchronizer is
/// a no-op, and backend errors are logged and swallowed. Relational errors are
/// never swallowed.
#[derive(Clone, Default)]
pub struct IndexSynchronizer {
    backend: Option<Arc<dyn SearchIndex>>,
}

impl IndexSynchronizer {
    pub fn new(backend: Option<Arc<dyn SearchIndex>>) -> Self {
        Self { backend }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Logs whether a backend is configured and answering.
    pub async fn log_status(&self) {
        match &self.backend {
            None => tracing::warn!("Search backend not configured, search is disabled"),
            Some(backend) if backend.ping().await => tracing::info!("Search backend detected"),
            Some(_) => tracing::warn!("Search backend configured but not answering"),
        }
    }

    pub fn before_commit<'a, I>(&self, pending: I) -> ChangeSet
    where
        I: IntoIterator<Item = (ChangeKind, &'a dyn Searchable)>,
    {
        let mut changes = ChangeSet::default();
        for (kind, entity) in pending {
            match kind {
                ChangeKind::Insert | ChangeKind::Update => changes.upserts.push(PendingDocument {
                    collection: entity.collection(),
                    id: entity.search_id().to_string(),
                    document: entity.to_document(),
                }),
                ChangeKind::Delete => changes
                    .removals
                    .push((entity.collection(), entity.search_id().to_string())),
            }
        }
        changes
    }

    /// Push a committed [`ChangeSet`] to the backend.
    pub async fn after_commit(&self, changes: ChangeSet) {
        let Some(backend) = &self.backend else {
            return;
        };
        if changes.is_empty() {
            return;
        }

        for pending in &changes.upserts {
            if let Err(e) = backend
                .index(pending.collection, &pending.id, &pending.document)
                .await
            {
                tracing::warn!(
                    "Failed to index {}/{}: {}",
                    pending.collection,
                    pending.id,
                    e
                );
            }
        }
        for (collection, id) in &changes.removals {
            if let Err(e) = backend.delete(collection, id).await {
                tracing::warn!("Failed to remove {}/{} from index: {}", collection, id, e);
            }
        }

        tracing::debug!(
            "Index synced: {} upserted, {} removed",
            changes.upserts.len(),
            changes.removals.len()
        );
    }

    pub async fn add_to_index(&self, entity: &dyn Searchable) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = backend
            .index(entity.collection(), entity.search_id(), &entity.to_document())
            .await
        {
            tracing::warn!(
                "Failed to index {}/{}: {}",
                entity.collection(),
                entity.search_id(),
                e
            );
        }
    }

    pub async fn remove_from_index(&self, entity: &dyn Searchable) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = backend.delete(entity.collection(), entity.search_id()).await {
            tracing::warn!(
                "Failed to remove {}/{} from index: {}",
                entity.collection(),
                entity.search_id(),
                e
            );
        }
    }

    /// Push every persisted row of `T` into the index. Returns how many rows were sent.
    pub async fn reindex<T: SearchableModel>(&self, pool: &SqlitePool) -> Result<usize, AppError> {
        if !self.is_available() {
            tracing::warn!("Reindex of {} skipped, search is disabled", T::COLLECTION);
            return Ok(0);
        }

        let rows = T::fetch_all(pool).await?;
        for row in &rows {
            self.add_to_index(row).await;
        }

        tracing::info!("Reindexed {} {} rows", rows.len(), T::COLLECTION);
        Ok(rows.len())
    }

    /// Ids of the matching documents for one page, and the total number of matches.
    pub async fn query_index(
        &self,
        collection: &str,
        query: &str,
        page: i64,
        per_page: i64,
    ) -> (Vec<String>, i64) {
        let Some(backend) = &self.backend else {
            return (Vec::new(), 0);
        };
        if query.trim().is_empty() || per_page < 1 {
            return (Vec::new(), 0);
        }

        let offset = Page::<()>::offset(page, per_page);
        match backend.search(collection, query, offset, per_page).await {
            Ok(hits) => (hits.ids, hits.total),
            Err(e) => {
                tracing::warn!("Search in {} failed: {}", collection, e);
                (Vec::new(), 0)
            }
        }
    }

    /// Search `T` and load the matching rows, in the index's relevance order.
    pub async fn search<T: SearchableModel>(
        &self,
        pool: &SqlitePool,
        query: &str,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<T>, i64), AppError> {
        let (ids, total) = self.query_index(T::COLLECTION, query, page, per_page).await;
        if ids.is_empty() {
            return Ok((Vec::new(), total));
        }

        let mut rows = T::fetch_by_ids(pool, &ids).await?;
        let rank: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        rows.sort_by_key(|row| rank.get(row.search_id()).copied().unwrap_or(usize::MAX));

        Ok((rows, total))
    }
}
