//! Explicit unit of work over the relational store.
//!
//! Callers stage inserts, updates and deletes, then `commit`. Commit snapshots
//! the searchable side of the staged changes, applies everything in one
//! transaction, and only once that transaction is durable hands the snapshot to
//! the [`IndexSynchronizer`]. A failed transaction rolls back and leaves the
//! index untouched.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::AppError;
use crate::search::{ChangeKind, IndexSynchronizer, Searchable};

/// A row type the unit of work can write.
#[async_trait]
pub trait Record: Send + Sync {
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), AppError>;

    async fn update(&self, conn: &mut SqliteConnection) -> Result<(), AppError>;

    async fn delete(&self, conn: &mut SqliteConnection) -> Result<(), AppError>;

    /// `Some` for types mirrored into the search index.
    fn as_searchable(&self) -> Option<&dyn Searchable> {
        None
    }
}

pub struct UnitOfWork<'p> {
    pool: &'p SqlitePool,
    staged: Vec<(ChangeKind, Box<dyn Record>)>,
}

impl<'p> UnitOfWork<'p> {
    pub fn new(pool: &'p SqlitePool) -> Self {
        Self {
            pool,
            staged: Vec::new(),
        }
    }

    pub fn add<R: Record + 'static>(&mut self, record: R) -> &mut Self {
        self.staged.push((ChangeKind::Insert, Box::new(record)));
        self
    }

    pub fn update<R: Record + 'static>(&mut self, record: R) -> &mut Self {
        self.staged.push((ChangeKind::Update, Box::new(record)));
        self
    }

    pub fn delete<R: Record + 'static>(&mut self, record: R) -> &mut Self {
        self.staged.push((ChangeKind::Delete, Box::new(record)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub async fn commit(self, index: &IndexSynchronizer) -> Result<(), AppError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let snapshot = index.before_commit(self.staged.iter().filter_map(|(kind, record)| {
            record.as_searchable().map(|entity| (*kind, entity))
        }));

        // Dropping `tx` on an early return rolls the transaction back
        let mut tx = self.pool.begin().await?;
        for (kind, record) in &self.staged {
            match kind {
                ChangeKind::Insert => record.insert(&mut *tx).await?,
                ChangeKind::Update => record.update(&mut *tx).await?,
                ChangeKind::Delete => record.delete(&mut *tx).await?,
            }
        }
        tx.commit().await?;

        index.after_commit(snapshot).await;
        Ok(())
    }
}
