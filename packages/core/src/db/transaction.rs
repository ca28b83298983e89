//! Optimistic Cross-Group Transactions
//!
//! A [`Transaction`] enlists a fixed set of ownership groups, records the
//! version of every record it reads, buffers writes, and hands everything to
//! [`NodeStore::commit`] in one request. The store applies the writes only if
//! none of the observed versions moved; otherwise the commit fails with
//! `StoreError::Conflict` and the caller retries the whole read-modify-write.

use super::error::{StoreError, StoreResult};
use super::node_store::{CommitRequest, NodeStore};
use crate::models::{node_id, ContentNode};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-modify-write unit spanning one or more ownership groups
pub struct Transaction {
    store: Arc<dyn NodeStore>,
    groups: Vec<String>,
    observed: BTreeMap<String, Option<i64>>,
    writes: Vec<ContentNode>,
}

impl Transaction {
    /// Start a transaction over the groups owning `ids`
    pub fn begin<'a>(store: Arc<dyn NodeStore>, ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut groups: Vec<String> = ids
            .into_iter()
            .map(|id| node_id::group_of(id).to_string())
            .collect();
        groups.sort();
        groups.dedup();

        Self {
            store,
            groups,
            observed: BTreeMap::new(),
            writes: Vec::new(),
        }
    }

    /// Groups enlisted in this transaction
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    fn check_enlisted(&self, id: &str) -> StoreResult<()> {
        let group = node_id::group_of(id);
        if self.groups.iter().any(|g| g == group) {
            Ok(())
        } else {
            Err(StoreError::group_not_enlisted(id, group))
        }
    }

    /// Read a record and remember the version observed
    ///
    /// Reads of a record already written in this transaction return the
    /// buffered copy.
    pub async fn get(&mut self, id: &str) -> StoreResult<Option<ContentNode>> {
        self.check_enlisted(id)?;

        if let Some(pending) = self.writes.iter().find(|node| node.id == id) {
            return Ok(Some(pending.clone()));
        }

        let node = self.store.get_node(id).await?;
        self.observed
            .entry(id.to_string())
            .or_insert_with(|| node.as_ref().map(|n| n.version));
        Ok(node)
    }

    /// Buffer a write; a later write of the same id replaces the earlier one
    pub fn put(&mut self, node: ContentNode) -> StoreResult<()> {
        self.check_enlisted(&node.id)?;
        match self.writes.iter_mut().find(|pending| pending.id == node.id) {
            Some(pending) => *pending = node,
            None => self.writes.push(node),
        }
        Ok(())
    }

    /// Apply all buffered writes atomically
    ///
    /// Returns the written records as persisted, in write order.
    pub async fn commit(self) -> StoreResult<Vec<ContentNode>> {
        let request = CommitRequest {
            groups: self.groups,
            expected: self.observed.into_iter().collect(),
            writes: self.writes,
        };
        self.store.commit(request).await
    }
}
