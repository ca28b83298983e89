//! In-Memory Entity Store
//!
//! Reference implementation of [`NodeStore`] used by tests and by callers
//! embedding the catalog without a remote store. It enforces the same limits
//! a production store does:
//!
//! - queries expanding into more than `max_subqueries` equality subqueries fail
//! - transactions spanning more than `max_transaction_groups` groups fail
//! - commits whose observed versions moved fail with a conflict
//!
//! All state sits behind one async `RwLock`, so a commit's check-then-apply is
//! atomic with respect to every other operation.

use super::error::{StoreError, StoreResult};
use super::node_store::{compare_values, CommitRequest, NodeStore, StoreQuery};
use crate::models::{Checkpoint, ContentNode};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Default subquery limit of the primitive store
pub const DEFAULT_MAX_SUBQUERIES: usize = 30;

/// Default number of ownership groups one transaction may span
pub const DEFAULT_MAX_TRANSACTION_GROUPS: usize = 25;

#[derive(Default)]
struct StoreState {
    nodes: BTreeMap<String, ContentNode>,
    checkpoints: HashMap<String, Checkpoint>,
    last_stamp: Option<DateTime<Utc>>,
}

impl StoreState {
    /// Strictly increasing write timestamp
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Keyed store held in process memory
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    max_subqueries: usize,
    max_transaction_groups: usize,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SUBQUERIES, DEFAULT_MAX_TRANSACTION_GROUPS)
    }

    /// Create an empty store with custom limits
    pub fn with_limits(max_subqueries: usize, max_transaction_groups: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            max_subqueries,
            max_transaction_groups,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every operation fails with `Unavailable` while false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("in-memory store is offline"))
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.nodes.is_empty()
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn get_node(&self, id: &str) -> StoreResult<Option<ContentNode>> {
        self.check_available()?;
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn get_nodes(&self, ids: &[String]) -> StoreResult<Vec<Option<ContentNode>>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(ids.iter().map(|id| state.nodes.get(id).cloned()).collect())
    }

    async fn query_nodes(&self, query: &StoreQuery) -> StoreResult<Vec<ContentNode>> {
        self.check_available()?;

        let subqueries = query.subquery_count();
        if subqueries > self.max_subqueries {
            return Err(StoreError::QueryTooComplex {
                subqueries,
                max: self.max_subqueries,
            });
        }

        let state = self.state.read().await;
        let mut matches: Vec<ContentNode> = state
            .nodes
            .values()
            .filter(|node| query.matches(node))
            .cloned()
            .collect();

        if let Some(sort) = &query.sort {
            matches.sort_by(|a, b| {
                let va = a.field_value(&sort.field).unwrap_or_default();
                let vb = b.field_value(&sort.field).unwrap_or_default();
                let ordering = compare_values(&va, &vb).then_with(|| a.id.cmp(&b.id));
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matches.into_iter().skip(query.offset).take(limit).collect())
    }

    async fn commit(&self, request: CommitRequest) -> StoreResult<Vec<ContentNode>> {
        self.check_available()?;

        if request.groups.len() > self.max_transaction_groups {
            return Err(StoreError::TooManyGroups {
                requested: request.groups.len(),
                max: self.max_transaction_groups,
            });
        }
        for node in &request.writes {
            let group = node.group_id();
            if !request.groups.iter().any(|g| g == group) {
                return Err(StoreError::group_not_enlisted(&node.id, group));
            }
        }

        let mut state = self.state.write().await;

        let conflicts: Vec<&String> = request
            .expected
            .iter()
            .filter(|(id, version)| state.nodes.get(id).map(|n| n.version) != *version)
            .map(|(id, _)| id)
            .collect();
        if !conflicts.is_empty() {
            return Err(StoreError::conflict(conflicts.into_iter().cloned()));
        }

        let mut written = Vec::with_capacity(request.writes.len());
        for mut node in request.writes {
            let stamp = state.next_stamp();
            node.version = state.nodes.get(&node.id).map_or(1, |n| n.version + 1);
            node.modified_at = stamp;
            state.nodes.insert(node.id.clone(), node.clone());
            written.push(node);
        }
        Ok(written)
    }

    async fn delete_node(&self, id: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.state.write().await.nodes.remove(id).is_some())
    }

    async fn load_checkpoint(&self, name: &str) -> StoreResult<Option<Checkpoint>> {
        self.check_available()?;
        Ok(self.state.read().await.checkpoints.get(name).cloned())
    }

    async fn save_checkpoint(&self, mut checkpoint: Checkpoint) -> StoreResult<Checkpoint> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let stored = state
            .checkpoints
            .get(&checkpoint.name)
            .map_or(0, |c| c.revision);
        if stored != checkpoint.revision {
            return Err(StoreError::conflict([checkpoint.name]));
        }

        checkpoint.revision += 1;
        state
            .checkpoints
            .insert(checkpoint.name.clone(), checkpoint.clone());
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FilterCondition, SortOrder};
    use crate::models::NodeKind;
    use serde_json::json;

    fn lesson(id: &str, tags: serde_json::Value, votes: i64) -> ContentNode {
        ContentNode::with_id(id, json!({"tags": tags, "votes_for": votes}))
            .unwrap()
            .listed(true)
    }

    #[tokio::test]
    async fn writes_stamp_version_and_modified() {
        let store = InMemoryStore::new();
        let first = store.put_node(lesson("Lesson_a", json!([]), 0)).await.unwrap();
        let second = store.put_node(first.clone()).await.unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(second.modified_at > first.modified_at);
    }

    #[tokio::test]
    async fn query_filters_sorts_and_pages() {
        let store = InMemoryStore::new();
        store.put_node(lesson("Lesson_a", json!(["x"]), 3)).await.unwrap();
        store.put_node(lesson("Lesson_b", json!(["y"]), 1)).await.unwrap();
        store.put_node(lesson("Lesson_c", json!(["x", "y"]), 2)).await.unwrap();

        let query = StoreQuery::new(NodeKind::Lesson)
            .filter("tags", FilterCondition::Eq(json!("x")))
            .order_by(SortOrder::parse("-votes_for"));
        let ids: Vec<String> = store
            .query_nodes(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["Lesson_a", "Lesson_c"]);

        let paged = store
            .query_nodes(&query.clone().offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, "Lesson_c");
    }

    #[tokio::test]
    async fn subquery_limit_is_enforced() {
        let store = InMemoryStore::new();
        let query = StoreQuery::new(NodeKind::Lesson)
            .filter("tags", FilterCondition::In(vec![json!("a"); 31]));
        assert!(matches!(
            store.query_nodes(&query).await,
            Err(StoreError::QueryTooComplex { subqueries: 31, max: 30 })
        ));
    }

    #[tokio::test]
    async fn ancestor_query_is_scoped_to_group() {
        let store = InMemoryStore::new();
        store
            .put_node(ContentNode::with_id("Comment_a.Practice_p", json!({})).unwrap())
            .await
            .unwrap();
        store
            .put_node(ContentNode::with_id("Comment_b.Practice_q", json!({})).unwrap())
            .await
            .unwrap();

        let query = StoreQuery::new(NodeKind::Comment).ancestor("Practice_p");
        let found = store.query_nodes(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "Comment_a.Practice_p");
    }

    #[tokio::test]
    async fn checkpoint_save_detects_lost_updates() {
        let store = InMemoryStore::new();
        let saved = store
            .save_checkpoint(Checkpoint::initial("the-indexer"))
            .await
            .unwrap();
        assert_eq!(saved.revision, 1);

        // A stale copy (revision 0) must not overwrite the newer record
        let stale = Checkpoint::initial("the-indexer");
        assert!(store.save_checkpoint(stale).await.unwrap_err().is_conflict());
        assert!(store.save_checkpoint(saved).await.is_ok());
    }

    #[tokio::test]
    async fn transaction_group_limit_is_enforced() {
        let store = InMemoryStore::with_limits(30, 1);
        let request = CommitRequest {
            groups: vec!["Course_A".into(), "Topic_T".into()],
            expected: Vec::new(),
            writes: Vec::new(),
        };
        assert!(matches!(
            store.commit(request).await,
            Err(StoreError::TooManyGroups { requested: 2, max: 1 })
        ));
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.get_node("Course_A").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
