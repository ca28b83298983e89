//! In-Memory Search Index
//!
//! [`SearchIndex`] backed by an ordered map. Id scans return pages of at most
//! [`SCAN_PAGE_SIZE`] ids; the page token is the last id of the previous page.

use super::error::{IndexError, IndexResult};
use super::search_index::{IdPage, SearchIndex};
use crate::models::SearchDocument;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Maximum ids returned by one scan page
pub const SCAN_PAGE_SIZE: usize = 100;

/// Search index held in process memory
pub struct InMemorySearchIndex {
    documents: RwLock<BTreeMap<String, SearchDocument>>,
    available: AtomicBool,
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every operation fails with `Unavailable` while false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> IndexResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(IndexError::unavailable("in-memory index is offline"))
        }
    }

    /// Whether a document with this id is present
    pub async fn contains(&self, doc_id: &str) -> bool {
        self.documents.read().await.contains_key(doc_id)
    }

    /// Copy of a stored document
    pub async fn document(&self, doc_id: &str) -> Option<SearchDocument> {
        self.documents.read().await.get(doc_id).cloned()
    }

    /// Ids of all stored documents, in order
    pub async fn doc_ids(&self) -> Vec<String> {
        self.documents.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, document: SearchDocument) -> IndexResult<()> {
        self.check_available()?;
        if document.doc_id.is_empty() {
            return Err(IndexError::document_rejected("", "empty document id"));
        }
        self.documents
            .write()
            .await
            .insert(document.doc_id.clone(), document);
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> IndexResult<()> {
        self.check_available()?;
        self.documents.write().await.remove(doc_id);
        Ok(())
    }

    async fn delete_many(&self, doc_ids: &[String]) -> IndexResult<()> {
        self.check_available()?;
        let mut documents = self.documents.write().await;
        for doc_id in doc_ids {
            documents.remove(doc_id);
        }
        Ok(())
    }

    async fn scan_ids(&self, page_token: Option<String>) -> IndexResult<IdPage> {
        self.check_available()?;
        let documents = self.documents.read().await;

        let lower = match &page_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Unbounded,
        };
        let mut remaining = documents.range((lower, Bound::Unbounded)).map(|(id, _)| id);

        let ids: Vec<String> = remaining.by_ref().take(SCAN_PAGE_SIZE).cloned().collect();
        let next_page_token = match (remaining.next(), ids.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(IdPage {
            ids,
            next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentNode;
    use serde_json::json;

    fn document(id: &str) -> SearchDocument {
        SearchDocument::from_node(&ContentNode::with_id(id, json!({})).unwrap())
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_is_idempotent() {
        let index = InMemorySearchIndex::new();
        index.upsert(document("Lesson_a")).await.unwrap();
        index.upsert(document("Lesson_a")).await.unwrap();
        assert_eq!(index.len().await, 1);

        index.delete("Lesson_a").await.unwrap();
        index.delete("Lesson_a").await.unwrap();
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn scan_pages_through_all_ids() {
        let index = InMemorySearchIndex::new();
        for i in 0..250 {
            index.upsert(document(&format!("Lesson_{:03}", i))).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut token = None;
        let mut pages = 0;
        loop {
            let page = index.scan_ids(token).await.unwrap();
            assert!(page.ids.len() <= SCAN_PAGE_SIZE);
            seen.extend(page.ids);
            pages += 1;
            token = page.next_page_token;
            if token.is_none() {
                break;
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen.len(), 250);
        assert_eq!(seen, index.doc_ids().await);
    }

    #[tokio::test]
    async fn offline_index_rejects_writes() {
        let index = InMemorySearchIndex::new();
        index.set_available(false);
        assert!(matches!(
            index.upsert(document("Lesson_a")).await,
            Err(IndexError::Unavailable(_))
        ));
    }
}
