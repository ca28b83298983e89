//! NodeStore Trait - Entity Store Abstraction
//!
//! This module defines the `NodeStore` trait the catalog consumes from its
//! primitive keyed store. The store itself is an external collaborator; the
//! crate ships [`InMemoryStore`](super::InMemoryStore) as a reference
//! implementation.
//!
//! # Contract
//!
//! - **Key lookup**: `get_node` / `get_nodes` are strongly consistent
//! - **Ancestor queries**: queries with `ancestor` set are strongly consistent
//!   within one ownership group
//! - **Filtered queries**: everything else is eventually consistent
//! - **Transactions**: `commit` applies a set of writes across one or more
//!   ownership groups atomically, after checking the versions observed by the
//!   caller (see [`Transaction`](super::Transaction))
//! - **Subquery limit**: an `In` filter expands into one equality subquery per
//!   value, and several `In` filters multiply; stores reject queries that
//!   expand past their limit
//!
//! Every successful write stamps `modified_at` and bumps `version`.

use super::error::StoreResult;
use crate::models::{Checkpoint, ContentNode, NodeKind};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;

/// Condition applied to one field
///
/// For list-valued fields a condition matches when any element matches.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Eq(Value),
    In(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
}

impl FilterCondition {
    /// Number of equality subqueries this condition expands into
    pub fn subqueries(&self) -> usize {
        match self {
            FilterCondition::In(values) => values.len(),
            _ => 1,
        }
    }

    /// Evaluate against a field value
    pub fn matches(&self, field_value: &Value) -> bool {
        if let Value::Array(items) = field_value {
            return items.iter().any(|item| self.matches_scalar(item));
        }
        self.matches_scalar(field_value)
    }

    fn matches_scalar(&self, value: &Value) -> bool {
        match self {
            FilterCondition::Eq(expected) => value == expected,
            FilterCondition::In(allowed) => allowed.contains(value),
            FilterCondition::Gt(bound) => compare_values(value, bound) == Ordering::Greater,
            FilterCondition::Gte(bound) => compare_values(value, bound) != Ordering::Less,
            FilterCondition::Lt(bound) => compare_values(value, bound) == Ordering::Less,
            FilterCondition::Lte(bound) => compare_values(value, bound) != Ordering::Greater,
        }
    }
}

/// Filter on one named field
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFilter {
    pub field: String,
    pub condition: FilterCondition,
}

/// Sort on one named field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub descending: bool,
}

impl SortOrder {
    /// Parse `"name"` (ascending) or `"-name"` (descending)
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: spec.to_string(),
                descending: false,
            },
        }
    }
}

/// Primitive query evaluated by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub kind: NodeKind,
    pub filters: Vec<StoreFilter>,
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Restrict to one ownership group (strongly consistent)
    pub ancestor: Option<String>,
}

impl StoreQuery {
    /// Unfiltered query over one kind
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            sort: None,
            limit: None,
            offset: 0,
            ancestor: None,
        }
    }

    /// Add a filter
    pub fn filter(mut self, field: impl Into<String>, condition: FilterCondition) -> Self {
        self.filters.push(StoreFilter {
            field: field.into(),
            condition,
        });
        self
    }

    /// Set the sort order
    pub fn order_by(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` results
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Restrict to one ownership group
    pub fn ancestor(mut self, group: impl Into<String>) -> Self {
        self.ancestor = Some(group.into());
        self
    }

    /// Product of the subquery counts of all filters
    pub fn subquery_count(&self) -> usize {
        self.filters
            .iter()
            .filter(|f| matches!(f.condition, FilterCondition::In(_)))
            .fold(1usize, |acc, f| acc.saturating_mul(f.condition.subqueries()))
    }

    /// Whether `node` satisfies kind, ancestor and every filter
    pub fn matches(&self, node: &ContentNode) -> bool {
        if node.kind != self.kind {
            return false;
        }
        if let Some(group) = &self.ancestor {
            if node.group_id() != group {
                return false;
            }
        }
        self.filters.iter().all(|filter| match node.field_value(&filter.field) {
            Some(value) => filter.condition.matches(&value),
            None => false,
        })
    }
}

/// Atomic multi-record write
///
/// `expected` lists the versions the caller observed: `Some(v)` means the
/// record must still be at version `v`, `None` means it must still be absent.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub groups: Vec<String>,
    pub expected: Vec<(String, Option<i64>)>,
    pub writes: Vec<ContentNode>,
}

impl CommitRequest {
    /// Blind single-record write within the record's own group
    pub fn single(node: ContentNode) -> Self {
        Self {
            groups: vec![node.group_id().to_string()],
            expected: Vec::new(),
            writes: vec![node],
        }
    }
}

/// Compare two JSON values for sorting and range filters
///
/// Strings compare lexically (timestamps are fixed-width RFC 3339), numbers
/// numerically, booleans false < true; missing/null sorts first.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(0.0);
            let fb = nb.as_f64().unwrap_or(0.0);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Abstraction over the primitive entity store
///
/// Implementations must be `Send + Sync`; the catalog shares one store across
/// concurrent requests as `Arc<dyn NodeStore>`.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Get a record by id (`Ok(None)` if absent)
    async fn get_node(&self, id: &str) -> StoreResult<Option<ContentNode>>;

    /// Get several records by id, preserving input order
    async fn get_nodes(&self, ids: &[String]) -> StoreResult<Vec<Option<ContentNode>>> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            nodes.push(self.get_node(id).await?);
        }
        Ok(nodes)
    }

    /// Evaluate a primitive query
    ///
    /// # Errors
    ///
    /// `StoreError::QueryTooComplex` if the query expands into more subqueries
    /// than the store supports.
    async fn query_nodes(&self, query: &StoreQuery) -> StoreResult<Vec<ContentNode>>;

    /// Apply writes atomically after checking observed versions
    ///
    /// Returns the records as persisted (new `version`, `modified_at`).
    ///
    /// # Errors
    ///
    /// - `StoreError::Conflict` if any expected version no longer matches
    /// - `StoreError::GroupNotEnlisted` if a write falls outside `groups`
    /// - `StoreError::TooManyGroups` if the store cannot span that many groups
    async fn commit(&self, request: CommitRequest) -> StoreResult<Vec<ContentNode>>;

    /// Blind write of one record
    async fn put_node(&self, node: ContentNode) -> StoreResult<ContentNode> {
        let id = node.id.clone();
        let mut written = self.commit(CommitRequest::single(node)).await?;
        written
            .pop()
            .ok_or_else(|| super::StoreError::unavailable(format!("write of {} returned nothing", id)))
    }

    /// Remove a record permanently; returns whether it existed
    async fn delete_node(&self, id: &str) -> StoreResult<bool>;

    /// Load a named checkpoint record
    async fn load_checkpoint(&self, name: &str) -> StoreResult<Option<Checkpoint>>;

    /// Save a checkpoint if its `revision` still matches the stored one
    ///
    /// A missing record counts as revision 0. Returns the saved record with
    /// its revision bumped.
    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> StoreResult<Checkpoint>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_fields_match_any_element() {
        let condition = FilterCondition::Eq(json!("growth"));
        assert!(condition.matches(&json!(["praise", "growth"])));
        assert!(!condition.matches(&json!(["praise"])));

        let condition = FilterCondition::In(vec![json!("a"), json!("b")]);
        assert!(condition.matches(&json!("b")));
        assert!(condition.matches(&json!(["x", "a"])));
        assert!(!condition.matches(&json!("c")));
    }

    #[test]
    fn range_conditions_use_value_ordering() {
        assert!(FilterCondition::Gt(json!(3)).matches(&json!(4)));
        assert!(!FilterCondition::Gt(json!(3)).matches(&json!(3)));
        assert!(FilterCondition::Gte(json!(3)).matches(&json!(3)));
        assert!(FilterCondition::Lt(json!("b")).matches(&json!("a")));
        assert!(FilterCondition::Lte(json!("b")).matches(&json!("b")));
    }

    #[test]
    fn subquery_count_multiplies_in_filters() {
        let query = StoreQuery::new(NodeKind::Lesson)
            .filter("listed", FilterCondition::Eq(json!(true)))
            .filter("tags", FilterCondition::In(vec![json!(1); 10]))
            .filter("subjects", FilterCondition::In(vec![json!(1); 4]));
        assert_eq!(query.subquery_count(), 40);
        assert_eq!(StoreQuery::new(NodeKind::Lesson).subquery_count(), 1);
    }

    #[test]
    fn sort_order_parses_direction() {
        assert_eq!(
            SortOrder::parse("-votes_for"),
            SortOrder {
                field: "votes_for".into(),
                descending: true
            }
        );
        assert!(!SortOrder::parse("name").descending);
    }
}
