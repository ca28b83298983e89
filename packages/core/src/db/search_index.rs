//! SearchIndex Trait - Full-Text Index Abstraction
//!
//! The catalog mirrors listed content into an external full-text index. This
//! trait is the narrow surface the catalog needs from it: put, delete, and a
//! paged scan of document ids.

use super::error::IndexResult;
use crate::models::SearchDocument;
use async_trait::async_trait;

/// One page of a document id scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    pub ids: Vec<String>,
    /// Token for the next page, `None` when the scan is complete
    pub next_page_token: Option<String>,
}

/// Abstraction over the remote search index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace a document (keyed by `doc_id`)
    async fn upsert(&self, document: SearchDocument) -> IndexResult<()>;

    /// Remove a document; removing an absent id is not an error
    async fn delete(&self, doc_id: &str) -> IndexResult<()>;

    /// Remove several documents
    async fn delete_many(&self, doc_ids: &[String]) -> IndexResult<()> {
        for doc_id in doc_ids {
            self.delete(doc_id).await?;
        }
        Ok(())
    }

    /// Scan document ids in bounded pages
    async fn scan_ids(&self, page_token: Option<String>) -> IndexResult<IdPage>;
}
