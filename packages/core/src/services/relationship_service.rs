//! Relationship Service
//!
//! Maintains the bidirectional edges of the content graph. For every relation
//! in [`crate::models::schema::RELATIONS`] the parent keeps an ordered
//! `child_list` of ids and the child keeps an unordered `parent_list`.
//!
//! # Consistency
//!
//! `c ∈ parent.child_list ⇔ parent ∈ c.parent_list` holds after every
//! successful call. Parent and child live in different ownership groups, so
//! each edit reads and writes both sides in one [`Transaction`] spanning both
//! groups. Conflicting concurrent edits are retried up to
//! `transaction_attempts` times, then surface as `ConcurrentModification`.

use crate::config::CatalogConfig;
use crate::db::{NodeStore, Transaction};
use crate::models::{node_id, relation_for, ContentNode, NodeKind, Relation};
use crate::services::error::{CatalogError, CatalogResult};
use crate::services::index_sync::IndexSynchronizer;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Direction for [`RelationshipService::reorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// One position toward the start of the list
    Up,
    /// One position toward the end of the list
    Down,
}

/// Where the child of an association comes from
#[derive(Clone, Copy)]
enum ChildSource<'a> {
    /// Must already be in the store
    Stored,
    /// Re-fetched if stored, otherwise left for the caller to write
    Pending(&'a ContentNode),
    /// Must be absent; written with the parent
    New(&'a ContentNode),
}

/// Graph edits over the relationship schema
pub struct RelationshipService {
    store: Arc<dyn NodeStore>,
    sync: Arc<IndexSynchronizer>,
    config: Arc<CatalogConfig>,
}

impl RelationshipService {
    pub fn new(
        store: Arc<dyn NodeStore>,
        sync: Arc<IndexSynchronizer>,
        config: Arc<CatalogConfig>,
    ) -> Self {
        Self {
            store,
            sync,
            config,
        }
    }

    /// Associate two existing nodes
    ///
    /// Inserts the child at `position` in the parent's child list (appends when
    /// `None` or past the end) and adds the parent to the child's parent set.
    /// Returns `(parent, child)` as persisted.
    ///
    /// # Errors
    ///
    /// - `UnsupportedRelationship` if the kind pair has no schema entry
    /// - `NodeNotFound` if either node is missing
    /// - `AlreadyAssociated` if the edge exists
    /// - `ConcurrentModification` if retries are exhausted
    pub async fn associate(
        &self,
        parent_id: &str,
        child_id: &str,
        position: Option<usize>,
    ) -> CatalogResult<(ContentNode, ContentNode)> {
        self.associate_inner(parent_id, child_id, ChildSource::Stored, position)
            .await
    }

    /// Associate a child that may not be persisted yet
    ///
    /// If `child` already exists in the store it is re-fetched and written as
    /// part of the transaction. Otherwise only the parent is written and the
    /// returned child carries the new parent id; the caller creating it is
    /// responsible for the final write.
    pub async fn associate_node(
        &self,
        parent_id: &str,
        child: &ContentNode,
        position: Option<usize>,
    ) -> CatalogResult<(ContentNode, ContentNode)> {
        self.associate_inner(parent_id, &child.id, ChildSource::Pending(child), position)
            .await
    }

    /// Persist a new child and its edge to `parent_id` in one transaction
    ///
    /// The child commit expects the id to be absent, so a racing creator
    /// makes this fail with `NodeExists` and the parent is left untouched.
    /// Either both records are written or neither is.
    pub async fn create_child(
        &self,
        parent_id: &str,
        child: &ContentNode,
        position: Option<usize>,
    ) -> CatalogResult<(ContentNode, ContentNode)> {
        self.associate_inner(parent_id, &child.id, ChildSource::New(child), position)
            .await
    }

    async fn associate_inner(
        &self,
        parent_id: &str,
        child_id: &str,
        source: ChildSource<'_>,
        position: Option<usize>,
    ) -> CatalogResult<(ContentNode, ContentNode)> {
        let relation = relation_between(parent_id, child_id)?;
        tracing::info!(
            "Associating {} with {} at {:?}",
            child_id,
            parent_id,
            position
        );

        let (mut written, child) = self
            .transact("associate", &[parent_id, child_id], move |mut tx| async move {
                let mut parent = fetch(&mut tx, parent_id).await?;
                let (write_child, mut child) = match (tx.get(child_id).await?, source) {
                    (Some(_), ChildSource::New(_)) => {
                        return Err(CatalogError::node_exists(child_id))
                    }
                    (Some(stored), _) => (true, stored),
                    (None, ChildSource::Stored) => {
                        return Err(CatalogError::node_not_found(child_id))
                    }
                    (None, ChildSource::Pending(node)) => (false, node.clone()),
                    (None, ChildSource::New(node)) => (true, node.clone()),
                };

                let mut children = parent.id_list(relation.child_list);
                if children.iter().any(|id| id == child_id) {
                    return Err(CatalogError::already_associated(parent_id, child_id));
                }
                let index = position.unwrap_or(children.len()).min(children.len());
                children.insert(index, child_id.to_string());
                parent.set_id_list(relation.child_list, children);

                let mut parents = child.id_list(relation.parent_list);
                if !parents.iter().any(|id| id == parent_id) {
                    parents.push(parent_id.to_string());
                }
                child.set_id_list(relation.parent_list, parents);

                tx.put(parent)?;
                if write_child {
                    tx.put(child.clone())?;
                }
                Ok((tx, child))
            })
            .await?;

        let parent = take_written(&mut written, parent_id)?;
        let child = take_written(&mut written, child_id).unwrap_or(child);
        Ok((parent, child))
    }

    /// Remove the edge between two nodes
    ///
    /// Removing an absent edge is not an error. A child that erroneously lists
    /// itself as a parent is cleaned up as well. Returns `(parent, child)` as
    /// persisted.
    pub async fn disassociate(
        &self,
        parent_id: &str,
        child_id: &str,
    ) -> CatalogResult<(ContentNode, ContentNode)> {
        let relation = relation_between(parent_id, child_id)?;
        tracing::info!("Disassociating {} from {}", child_id, parent_id);

        let (mut written, ()) = self
            .transact("disassociate", &[parent_id, child_id], move |mut tx| async move {
                let mut parent = fetch(&mut tx, parent_id).await?;
                let mut child = fetch(&mut tx, child_id).await?;

                let mut children = parent.id_list(relation.child_list);
                children.retain(|id| id != child_id);
                parent.set_id_list(relation.child_list, children);

                let mut parents = child.id_list(relation.parent_list);
                parents.retain(|id| id != parent_id && id != child_id);
                child.set_id_list(relation.parent_list, parents);

                tx.put(parent)?;
                tx.put(child)?;
                Ok((tx, ()))
            })
            .await?;

        let parent = take_written(&mut written, parent_id)?;
        let child = take_written(&mut written, child_id)?;
        Ok((parent, child))
    }

    /// Move a child one position within its parent's child list
    ///
    /// A child not in the list, or a move past either end, leaves the list
    /// unchanged; the parent is written back either way. Returns the parent.
    pub async fn reorder(
        &self,
        parent_id: &str,
        child_id: &str,
        direction: Direction,
    ) -> CatalogResult<ContentNode> {
        let relation = relation_between(parent_id, child_id)?;
        tracing::info!("Reordering {} {:?} in {}", child_id, direction, parent_id);

        let (mut written, ()) = self
            .transact("reorder", &[parent_id, child_id], move |mut tx| async move {
                let mut parent = fetch(&mut tx, parent_id).await?;
                fetch(&mut tx, child_id).await?;

                let mut children = parent.id_list(relation.child_list);
                if let Some(index) = children.iter().position(|id| id == child_id) {
                    let target = match direction {
                        Direction::Up => index.checked_sub(1),
                        Direction::Down => Some(index + 1).filter(|&i| i < children.len()),
                    };
                    match target {
                        Some(target) => children.swap(index, target),
                        None => tracing::debug!(
                            "{} is already at the {:?} end of {}",
                            child_id,
                            direction,
                            parent_id
                        ),
                    }
                }
                parent.set_id_list(relation.child_list, children);

                tx.put(parent)?;
                Ok((tx, ()))
            })
            .await?;

        take_written(&mut written, parent_id)
    }

    /// Children of `parent_id` of one kind, in display order
    ///
    /// Missing and soft-deleted children are skipped.
    pub async fn children(
        &self,
        parent_id: &str,
        child_kind: NodeKind,
    ) -> CatalogResult<Vec<ContentNode>> {
        let parent = self.get_existing(parent_id).await?;
        let relation = relation_for(parent.kind, child_kind)
            .ok_or_else(|| CatalogError::unsupported_relationship(parent.kind, child_kind))?;
        self.resolve(&parent.id_list(relation.child_list)).await
    }

    /// Parents of `child_id` of one kind
    pub async fn parents(
        &self,
        child_id: &str,
        parent_kind: NodeKind,
    ) -> CatalogResult<Vec<ContentNode>> {
        let child = self.get_existing(child_id).await?;
        let relation = relation_for(parent_kind, child.kind)
            .ok_or_else(|| CatalogError::unsupported_relationship(parent_kind, child.kind))?;
        self.resolve(&child.id_list(relation.parent_list)).await
    }

    async fn get_existing(&self, id: &str) -> CatalogResult<ContentNode> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| CatalogError::node_not_found(id))
    }

    async fn resolve(&self, ids: &[String]) -> CatalogResult<Vec<ContentNode>> {
        Ok(self
            .store
            .get_nodes(ids)
            .await?
            .into_iter()
            .flatten()
            .filter(|node| !node.deleted)
            .collect())
    }

    /// Run `body` in a transaction over the groups of `ids`, retrying conflicts
    ///
    /// `body` reads through the transaction, buffers its writes and hands the
    /// transaction back for commit. Committed records go through the reactive
    /// index hook.
    async fn transact<T, F, Fut>(
        &self,
        context: &str,
        ids: &[&str],
        body: F,
    ) -> CatalogResult<(Vec<ContentNode>, T)>
    where
        F: Fn(Transaction) -> Fut,
        Fut: Future<Output = CatalogResult<(Transaction, T)>>,
    {
        let attempts = self.config.transaction_attempts;

        for attempt in 1..=attempts {
            let tx = Transaction::begin(self.store.clone(), ids.iter().copied());
            let (tx, value) = body(tx).await?;

            match tx.commit().await {
                Ok(written) => {
                    for node in &written {
                        self.sync.on_node_written(node).await;
                    }
                    return Ok((written, value));
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        "{} on {} conflicted (attempt {}/{}): {}",
                        context,
                        ids.join(", "),
                        attempt,
                        attempts,
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CatalogError::concurrent_modification(
            format!("{} on {}", context, ids.join(", ")),
            attempts,
        ))
    }
}

/// Schema entry for the kinds encoded in two ids
fn relation_between(parent_id: &str, child_id: &str) -> CatalogResult<&'static Relation> {
    let parent_kind = node_id::kind_of(parent_id)?;
    let child_kind = node_id::kind_of(child_id)?;
    relation_for(parent_kind, child_kind)
        .ok_or_else(|| CatalogError::unsupported_relationship(parent_kind, child_kind))
}

async fn fetch(tx: &mut Transaction, id: &str) -> CatalogResult<ContentNode> {
    tx.get(id)
        .await?
        .ok_or_else(|| CatalogError::node_not_found(id))
}

fn take_written(written: &mut Vec<ContentNode>, id: &str) -> CatalogResult<ContentNode> {
    let index = written
        .iter()
        .position(|node| node.id == id)
        .ok_or_else(|| CatalogError::node_not_found(id))?;
    Ok(written.swap_remove(index))
}
