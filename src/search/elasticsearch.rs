use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{Document, SearchError, SearchHits, SearchIndex};
use crate::error::AppError;

/// Elasticsearch-compatible backend spoken to over its REST API.
pub struct ElasticsearchIndex {
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Total,
    hits: Vec<Hit>,
}

// Older servers report a bare number, newer ones `{"value": n, "relation": ..}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Total {
    Count(i64),
    Object { value: i64 },
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

impl ElasticsearchIndex {
    /// `timeout` bounds every request; an elapsed timeout surfaces as an error.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Invalid search client settings: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, collection, id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Status { status, body })
    }
}

pub(crate) fn query_body(query: &str, offset: i64, limit: i64) -> serde_json::Value {
    serde_json::json!({
        "query": {
            "multi_match": {
                "query": query,
                "fields": ["*"],
            }
        },
        "from": offset,
        "size": limit,
    })
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn ping(&self) -> bool {
        match self.http_client.get(&self.base_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Search backend ping failed: {}", e);
                false
            }
        }
    }

    async fn index(&self, collection: &str, id: &str, document: &Document) -> Result<(), SearchError> {
        let response = self
            .http_client
            .put(self.document_url(collection, id))
            .json(document)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SearchError> {
        let response = self
            .http_client
            .delete(self.document_url(collection, id))
            .send()
            .await?;

        // Already gone is the state we wanted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        offset: i64,
        limit: i64,
    ) -> Result<SearchHits, SearchError> {
        let response = self
            .http_client
            .post(format!("{}/{}/_search", self.base_url, collection))
            .json(&query_body(query, offset, limit))
            .send()
            .await?;

        // Searching a collection nothing was ever indexed into
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SearchHits::default());
        }

        let parsed: SearchResponse = Self::check(response).await?.json().await?;
        let total = match parsed.hits.total {
            Total::Count(n) | Total::Object { value: n } => n,
        };

        Ok(SearchHits {
            ids: parsed.hits.hits.into_iter().map(|hit| hit.id).collect(),
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_body_targets_all_fields() {
        let body = query_body("hello", 6, 3);
        assert_eq!(body["query"]["multi_match"]["query"], "hello");
        assert_eq!(body["query"]["multi_match"]["fields"][0], "*");
        assert_eq!(body["from"], 6);
        assert_eq!(body["size"], 3);
    }

    #[test]
    fn test_parses_both_total_shapes() {
        let modern: SearchResponse = serde_json::from_str(
            r#"{"hits":{"total":{"value":2,"relation":"eq"},"hits":[{"_id":"a"},{"_id":"b"}]}}"#,
        )
        .unwrap();
        assert!(matches!(modern.hits.total, Total::Object { value: 2 }));
        assert_eq!(modern.hits.hits.len(), 2);

        let legacy: SearchResponse =
            serde_json::from_str(r#"{"hits":{"total":5,"hits":[{"_id":"x","_score":1.0}]}}"#).unwrap();
        assert!(matches!(legacy.hits.total, Total::Count(5)));
        assert_eq!(legacy.hits.hits[0].id, "x");
    }

    #[test]
    fn test_document_url_strips_trailing_slash() {
        let index = ElasticsearchIndex::new("http://localhost:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(index.document_url("post", "p1"), "http://localhost:9200/post/_doc/p1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_errors_instead_of_hanging() {
        // Port 9 (discard) is closed on test machines; connection is refused quickly
        let index = ElasticsearchIndex::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(!index.ping().await);
        assert!(index.search("post", "hello", 0, 3).await.is_err());
    }
}
