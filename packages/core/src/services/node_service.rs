//! Node Service - Core CRUD Operations
//!
//! This module provides the write and read paths for single content nodes:
//!
//! - Creation, optionally attached to a parent in the same call
//! - Key reads that hide soft-deleted nodes
//! - Single writes (reactive index sync) and batch writes (sync deferred to
//!   the reconcile job)
//! - Soft and hard deletion
//!
//! Every single-node write runs the [`IndexSynchronizer`] hook after the
//! store accepted it. Batch writes skip the hook and wake the reconcile
//! processor instead, so bulk imports don't cost one index call per node.

use crate::config::CatalogConfig;
use crate::db::{CommitRequest, NodeStore, StoreError, StoreResult};
use crate::models::{node_id, ContentNode, NodeKind};
use crate::services::error::{CatalogError, CatalogResult};
use crate::services::index_sync::IndexSynchronizer;
use crate::services::reconcile_processor::ReconcileWaker;
use crate::services::relationship_service::RelationshipService;
use serde_json::Value;
use std::sync::Arc;

/// Parameters for creating a node
///
/// # Examples
///
/// ```rust
/// # use catalog_core::services::CreateNodeParams;
/// # use catalog_core::models::NodeKind;
/// # use serde_json::json;
/// // Lesson with a readable id, attached at the top of a topic
/// let params = CreateNodeParams {
///     identifier: Some("praise-effort".to_string()),
///     parent_id: Some("Topic_growth".to_string()),
///     position: Some(0),
///     listed: true,
///     ..CreateNodeParams::new(NodeKind::Lesson, json!({"name": "Praise effort"}))
/// };
/// assert_eq!(params.kind, NodeKind::Lesson);
/// ```
#[derive(Debug, Clone)]
pub struct CreateNodeParams {
    pub kind: NodeKind,
    /// Readable identifier; eight random characters when `None`
    pub identifier: Option<String>,
    /// Owning record, for records stored under another record's group
    pub owner: Option<String>,
    /// Parent to associate the new node with
    pub parent_id: Option<String>,
    /// Position in the parent's child list (appends when `None`)
    pub position: Option<usize>,
    pub listed: bool,
    pub properties: Value,
}

impl CreateNodeParams {
    pub fn new(kind: NodeKind, properties: Value) -> Self {
        Self {
            kind,
            identifier: None,
            owner: None,
            parent_id: None,
            position: None,
            listed: false,
            properties,
        }
    }
}

/// Single-node reads and writes
pub struct NodeService {
    store: Arc<dyn NodeStore>,
    sync: Arc<IndexSynchronizer>,
    relationships: Arc<RelationshipService>,
    config: Arc<CatalogConfig>,
    reconcile_waker: Option<ReconcileWaker>,
}

impl NodeService {
    pub fn new(
        store: Arc<dyn NodeStore>,
        sync: Arc<IndexSynchronizer>,
        relationships: Arc<RelationshipService>,
        config: Arc<CatalogConfig>,
    ) -> Self {
        Self {
            store,
            sync,
            relationships,
            config,
            reconcile_waker: None,
        }
    }

    /// Wake this processor after batch writes
    pub fn with_reconcile_waker(mut self, waker: ReconcileWaker) -> Self {
        self.reconcile_waker = Some(waker);
        self
    }

    /// Create and persist a node
    ///
    /// With `parent_id` set, the node and the parent's new edge are written in
    /// one transaction, so a failed create never leaves the parent pointing at
    /// a missing child.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a malformed identifier or properties
    /// - `NodeExists` if the id is already taken
    /// - any error of [`RelationshipService::create_child`]
    pub async fn create_node(&self, params: CreateNodeParams) -> CatalogResult<ContentNode> {
        let id = node_id::generate(
            params.kind,
            params.identifier.as_deref(),
            params.owner.as_deref(),
        )?;
        if self.store.get_node(&id).await?.is_some() {
            return Err(CatalogError::node_exists(id));
        }

        let node = ContentNode::with_id(id, params.properties)?.listed(params.listed);
        node.validate()?;
        tracing::info!("Creating {}", node.id);

        if let Some(parent_id) = &params.parent_id {
            // The relationship transaction already ran the index hook
            let (_, created) = self
                .relationships
                .create_child(parent_id, &node, params.position)
                .await?;
            return Ok(created);
        }

        // The id must still be free when the write lands
        let request = CommitRequest {
            groups: vec![node.group_id().to_string()],
            expected: vec![(node.id.clone(), None)],
            writes: vec![node],
        };
        let created = match self.store.commit(request).await {
            Ok(mut written) => written
                .pop()
                .ok_or_else(|| CatalogError::Store(StoreError::unavailable("empty commit result")))?,
            Err(StoreError::Conflict { ids }) => {
                return Err(CatalogError::node_exists(ids.join(", ")))
            }
            Err(e) => return Err(e.into()),
        };

        self.sync.on_node_written(&created).await;
        Ok(created)
    }

    /// Get a node by id; soft-deleted nodes read as absent
    pub async fn get_node(&self, id: &str) -> CatalogResult<Option<ContentNode>> {
        Ok(self.store.get_node(id).await?.filter(|node| !node.deleted))
    }

    /// Get several nodes by id, preserving order
    pub async fn get_nodes(&self, ids: &[String]) -> CatalogResult<Vec<Option<ContentNode>>> {
        Ok(self
            .store
            .get_nodes(ids)
            .await?
            .into_iter()
            .map(|node| node.filter(|n| !n.deleted))
            .collect())
    }

    /// Write `node` only if the stored version is still the one it was read at
    ///
    /// A node never read from the store (version 0) must not exist yet.
    async fn commit_checked(&self, node: ContentNode) -> StoreResult<ContentNode> {
        let id = node.id.clone();
        let expected = if node.version > 0 {
            Some(node.version)
        } else {
            None
        };
        let request = CommitRequest {
            groups: vec![node.group_id().to_string()],
            expected: vec![(id.clone(), expected)],
            writes: vec![node],
        };
        self.store
            .commit(request)
            .await?
            .pop()
            .ok_or_else(|| StoreError::unavailable(format!("empty commit result for {}", id)))
    }

    /// Write a node and sync it to the index
    ///
    /// A node read from the store (version > 0) is only written if nobody
    /// wrote it in between; otherwise the write fails with
    /// `ConcurrentModification` and the caller re-reads.
    pub async fn save_node(&self, node: ContentNode) -> CatalogResult<ContentNode> {
        node.validate()?;
        tracing::debug!("Saving {} (version {})", node.id, node.version);

        let id = node.id.clone();
        let saved = match self.commit_checked(node).await {
            Ok(saved) => saved,
            Err(e) if e.is_conflict() => {
                return Err(CatalogError::concurrent_modification(id, 1));
            }
            Err(e) => return Err(e.into()),
        };

        self.sync.on_node_written(&saved).await;
        Ok(saved)
    }

    /// Write many nodes without the reactive index hook
    ///
    /// Each node is version-checked like [`Self::save_node`]. The first stale
    /// node stops the batch with `ConcurrentModification`; nodes before it
    /// stay written. The reconcile job picks the changes up; if a processor is
    /// attached it is woken once for the whole batch.
    pub async fn save_nodes_batch(&self, nodes: Vec<ContentNode>) -> CatalogResult<Vec<ContentNode>> {
        for node in &nodes {
            node.validate()?;
        }
        tracing::info!("Saving batch of {} nodes", nodes.len());

        let mut saved = Vec::with_capacity(nodes.len());
        let mut result = Ok(());
        for node in nodes {
            let id = node.id.clone();
            match self.commit_checked(node).await {
                Ok(node) => saved.push(node),
                Err(e) => {
                    tracing::warn!("Batch stopped at {} after {} writes: {}", id, saved.len(), e);
                    result = Err(if e.is_conflict() {
                        CatalogError::concurrent_modification(id, 1)
                    } else {
                        e.into()
                    });
                    break;
                }
            }
        }

        if !saved.is_empty() {
            if let Some(waker) = &self.reconcile_waker {
                waker.wake();
            }
        }
        result.map(|()| saved)
    }

    /// Mark a node deleted and drop its search document
    ///
    /// The flag is written against the version just read; an edge edit landing
    /// in between makes the write conflict, and the node is re-read so its
    /// relation lists are kept. Deleting an already-deleted node is a no-op.
    pub async fn soft_delete(&self, id: &str) -> CatalogResult<ContentNode> {
        let attempts = self.config.transaction_attempts;

        for attempt in 1..=attempts {
            let mut node = self
                .store
                .get_node(id)
                .await?
                .ok_or_else(|| CatalogError::node_not_found(id))?;
            if node.deleted {
                return Ok(node);
            }

            tracing::info!("Soft-deleting {}", id);
            node.deleted = true;
            match self.commit_checked(node).await {
                Ok(deleted) => {
                    self.sync.on_node_removed(id).await;
                    return Ok(deleted);
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        "soft_delete on {} conflicted (attempt {}/{}): {}",
                        id,
                        attempt,
                        attempts,
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CatalogError::concurrent_modification(
            format!("soft_delete on {}", id),
            attempts,
        ))
    }

    /// Remove a node permanently along with its search document
    pub async fn hard_delete(&self, id: &str) -> CatalogResult<()> {
        tracing::info!("Deleting {}", id);
        if !self.store.delete_node(id).await? {
            return Err(CatalogError::node_not_found(id));
        }
        self.sync.on_node_removed(id).await;
        Ok(())
    }
}
