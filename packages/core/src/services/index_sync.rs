//! Search Index Synchronization
//!
//! Keeps the search index a lagging, eventually-correct mirror of every node
//! that is listed, not deleted, and of an indexed kind. Two paths feed it:
//!
//! 1. **Reactive**: [`IndexSynchronizer::on_node_written`] runs right after a
//!    node write. Failures are logged and swallowed; the write itself already
//!    succeeded and the catch-up job will retry.
//! 2. **Catch-up**: [`IndexSynchronizer::reconcile`] walks nodes modified since
//!    the persisted checkpoint in small batches and advances the checkpoint to
//!    the newest modification actually processed.
//!
//! `reindex_all` and `purge_index` are disaster-recovery tools and leave the
//! checkpoint alone.

use crate::config::CatalogConfig;
use crate::db::{
    FilterCondition, IndexResult, NodeStore, SearchIndex, SortOrder, StoreError, StoreQuery,
};
use crate::models::{node_id, timestamp_value, Checkpoint, ContentNode, NodeKind, SearchDocument};
use crate::services::error::{CatalogError, CatalogResult};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of one reconcile run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Documents upserted
    pub indexed: usize,
    /// Documents removed because the node was soft-deleted
    pub removed: usize,
    /// Checkpoint value after the run
    pub last_check: DateTime<Utc>,
}

impl ReconcileReport {
    /// Nodes processed in total
    pub fn processed(&self) -> usize {
        self.indexed + self.removed
    }
}

/// Mirrors listed content into the search index
pub struct IndexSynchronizer {
    store: Arc<dyn NodeStore>,
    index: Arc<dyn SearchIndex>,
    config: Arc<CatalogConfig>,
    // Serializes reconcile / reindex / purge within this process
    job_lock: Mutex<()>,
}

impl IndexSynchronizer {
    pub fn new(
        store: Arc<dyn NodeStore>,
        index: Arc<dyn SearchIndex>,
        config: Arc<CatalogConfig>,
    ) -> Self {
        Self {
            store,
            index,
            config,
            job_lock: Mutex::new(()),
        }
    }

    /// Whether documents of `kind` belong in the index
    pub fn is_indexed(&self, kind: NodeKind) -> bool {
        self.config.is_indexed(kind)
    }

    /// Bring the index in line with one node
    ///
    /// Upserts the document if the node is searchable, deletes it otherwise.
    /// Errors propagate; see [`Self::on_node_written`] for the swallowing hook.
    pub async fn sync_node(&self, node: &ContentNode) -> IndexResult<()> {
        if !self.is_indexed(node.kind) {
            return Ok(());
        }
        if node.is_searchable() {
            tracing::debug!("Indexing {}", node.id);
            self.index.upsert(SearchDocument::from_node(node)).await
        } else {
            tracing::debug!("Removing {} from index", node.id);
            self.index.delete(&node.id).await
        }
    }

    /// Reactive hook run after every node write
    pub async fn on_node_written(&self, node: &ContentNode) {
        if let Err(e) = self.sync_node(node).await {
            tracing::warn!(
                "Reactive index sync failed for {} (left for reconcile): {}",
                node.id,
                e
            );
        }
    }

    /// Reactive hook run after a node is removed from the store or soft-deleted
    pub async fn on_node_removed(&self, id: &str) {
        match node_id::kind_of(id) {
            Ok(kind) if self.is_indexed(kind) => {}
            _ => return,
        }
        tracing::debug!("Removing {} from index", id);
        if let Err(e) = self.index.delete(id).await {
            tracing::warn!("Index delete failed for {} (left for reconcile): {}", id, e);
        }
    }

    /// Current checkpoint, or a fresh one if none was ever saved
    pub async fn checkpoint(&self) -> CatalogResult<Checkpoint> {
        let name = &self.config.checkpoint_name;
        Ok(self
            .store
            .load_checkpoint(name)
            .await?
            .unwrap_or_else(|| Checkpoint::initial(name.as_str())))
    }

    /// Incremental catch-up from the checkpoint
    ///
    /// For every indexed kind, processes up to `reconcile_batch_size` listed
    /// nodes modified after the checkpoint, oldest first. The checkpoint then
    /// moves to the newest `modified` processed, or to now if nothing was.
    ///
    /// The checkpoint is shared by all kinds. If one kind fills its batch at
    /// t1 while another processes a node at t2 > t1, the first kind's nodes
    /// modified in (t1, t2] are not revisited until they are written again or
    /// [`Self::reindex_all`] runs. Like the page-scoped post-filter of the
    /// query service, this is a known limitation.
    ///
    /// # Errors
    ///
    /// Store and index errors abort the run without moving the checkpoint,
    /// so the next run retries the same nodes. A checkpoint saved concurrently
    /// by another run surfaces as `ConcurrentModification`.
    pub async fn reconcile(&self) -> CatalogResult<ReconcileReport> {
        let _guard = self.job_lock.lock().await;

        let mut checkpoint = self.checkpoint().await?;
        let since = checkpoint.last_check;
        tracing::info!("Reconciling search index since {}", since);

        let mut indexed = 0;
        let mut removed = 0;
        let mut newest: Option<DateTime<Utc>> = None;

        for kind in &self.config.indexed_kinds {
            let query = StoreQuery::new(*kind)
                .filter("modified", FilterCondition::Gt(timestamp_value(since)))
                .filter("listed", FilterCondition::Eq(json!(true)))
                .order_by(SortOrder::parse("modified"))
                .limit(self.config.reconcile_batch_size);

            for node in self.store.query_nodes(&query).await? {
                if let Err(e) = self.sync_node(&node).await {
                    tracing::error!("Reconcile stopped at {}: {}", node.id, e);
                    return Err(e.into());
                }
                if node.deleted {
                    removed += 1;
                } else {
                    indexed += 1;
                }
                newest = newest.max(Some(node.modified_at));
            }
        }

        checkpoint.advance_to(newest.unwrap_or_else(Utc::now));
        let saved = self
            .store
            .save_checkpoint(checkpoint)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => {
                    CatalogError::concurrent_modification(&self.config.checkpoint_name, 1)
                }
                other => other.into(),
            })?;

        tracing::info!(
            "Reconcile indexed {} and removed {} documents, checkpoint now {}",
            indexed,
            removed,
            saved.last_check
        );

        Ok(ReconcileReport {
            indexed,
            removed,
            last_check: saved.last_check,
        })
    }

    /// Re-index every listed node of every indexed kind
    ///
    /// Returns the number of documents upserted. Does not touch the checkpoint.
    pub async fn reindex_all(&self) -> CatalogResult<usize> {
        let _guard = self.job_lock.lock().await;
        tracing::info!("Reindexing all listed content");

        let page_size = self.config.reindex_page_size;
        let mut total = 0;

        for kind in &self.config.indexed_kinds {
            let mut offset = 0;
            loop {
                let query = StoreQuery::new(*kind)
                    .filter("listed", FilterCondition::Eq(json!(true)))
                    .order_by(SortOrder::parse("uid"))
                    .offset(offset)
                    .limit(page_size);
                let page = self.store.query_nodes(&query).await?;
                let fetched = page.len();

                for node in &page {
                    self.sync_node(node).await?;
                    if node.is_searchable() {
                        total += 1;
                    }
                }

                if fetched < page_size {
                    break;
                }
                offset += fetched;
            }
        }

        tracing::info!("Reindexed {} documents", total);
        Ok(total)
    }

    /// Delete every document in the index
    ///
    /// Scans are bounded, so this loops until a scan comes back empty.
    /// Returns the number of documents deleted.
    pub async fn purge_index(&self) -> CatalogResult<usize> {
        let _guard = self.job_lock.lock().await;
        tracing::info!("Purging search index {}", self.config.content_index);

        let mut total = 0;
        loop {
            let page = self.index.scan_ids(None).await?;
            if page.ids.is_empty() {
                break;
            }
            self.index.delete_many(&page.ids).await?;
            total += page.ids.len();
            tracing::debug!("Purged {} documents ({} total)", page.ids.len(), total);
        }

        tracing::info!("Purged {} documents", total);
        Ok(total)
    }
}
