use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::tokenizer::tokenize;
use super::{Document, SearchError, SearchHits, SearchIndex};

#[derive(Default)]
struct Collection {
    // id -> tokens it was indexed under, so a re-index can drop stale postings
    documents: HashMap<String, BTreeSet<String>>,
    postings: HashMap<String, BTreeSet<String>>,
}

impl Collection {
    fn remove(&mut self, id: &str) {
        if let Some(tokens) = self.documents.remove(id) {
            for token in tokens {
                if let Some(ids) = self.postings.get_mut(&token) {
                    ids.remove(id);
                    if ids.is_empty() {
                        self.postings.remove(&token);
                    }
                }
            }
        }
    }

    fn insert(&mut self, id: &str, document: &Document) {
        self.remove(id);

        let tokens: BTreeSet<String> = document
            .values()
            .filter_map(|value| value.as_str())
            .flat_map(tokenize)
            .collect();
        for token in &tokens {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.documents.insert(id.to_string(), tokens);
    }
}

/// In-process inverted index.
///
/// Relevance is the number of distinct query words a document contains; equal
/// scores are ordered by id so repeated queries return identical pages.
#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn ping(&self) -> bool {
        true
    }

    async fn index(&self, collection: &str, id: &str, document: &Document) -> Result<(), SearchError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, document);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SearchError> {
        let mut collections = self.collections.write().await;
        if let Some(c) = collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        offset: i64,
        limit: i64,
    ) -> Result<SearchHits, SearchError> {
        let collections = self.collections.read().await;
        let Some(c) = collections.get(collection) else {
            return Ok(SearchHits::default());
        };

        let mut scores: BTreeMap<&str, usize> = BTreeMap::new();
        for token in tokenize(query) {
            if let Some(ids) = c.postings.get(&token) {
                for id in ids {
                    *scores.entry(id.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize)> = scores.into_iter().collect();
        // BTreeMap iteration is id-ascending; a stable sort keeps that for ties
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let total = ranked.len() as i64;
        let ids = ranked
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(id, _)| id.to_string())
            .collect();

        Ok(SearchHits { ids, total })
    }
}
