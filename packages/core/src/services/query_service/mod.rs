//! Query Service - Filtered Listing with a Subquery Budget
//!
//! This module answers "list nodes of kind K matching filters F, sorted,
//! paginated" against a store that evaluates at most `max_subqueries`
//! equality subqueries per query. A filter listing N allowed values costs N
//! subqueries and several such filters multiply.
//!
//! # Budgeting
//!
//! When the product exceeds the budget, the multi-valued filter with the
//! largest list is demoted (removed from the store query) until the rest fits.
//! Demoted filters are applied in memory to the fetched page. Because that
//! page is already paginated, demotion can under-return relative to a full
//! intersection; this is a known limitation.
//!
//! # Visibility
//!
//! - Ancestor-scoped queries see every non-deleted node of the owner
//! - Elevated callers, and kinds without a listed flag, see non-deleted nodes
//! - Everyone else sees listed, non-deleted nodes only
//!
//! # Examples
//!
//! ```rust
//! use catalog_core::services::query_service::{QueryRequest, Caller};
//! use catalog_core::models::NodeKind;
//! use serde_json::json;
//!
//! let request = QueryRequest::new(NodeKind::Lesson)
//!     .filter_any("tags", vec![json!("praise"), json!("growth")])
//!     .filter("type", json!("video"))
//!     .sort("-votes_for")
//!     .page_size(10);
//! assert_eq!(request.filters.len(), 2);
//! # let _ = Caller::Public;
//! ```

use crate::config::CatalogConfig;
use crate::db::{FilterCondition, NodeStore, SortOrder, StoreQuery};
use crate::models::{node_id, ContentNode, NodeKind};
use crate::services::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Requested value(s) for one field
///
/// A JSON array deserializes as `Many`, anything else as `Single`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Field is one of these values (cost = number of values)
    Many(Vec<Value>),
    /// Field equals this value (cost 1)
    Single(Value),
}

impl FilterValue {
    /// Subqueries this filter expands into
    pub fn cost(&self) -> usize {
        match self {
            FilterValue::Single(_) => 1,
            FilterValue::Many(values) => values.len(),
        }
    }

    fn condition(&self) -> FilterCondition {
        match self {
            FilterValue::Single(value) => FilterCondition::Eq(value.clone()),
            FilterValue::Many(values) => FilterCondition::In(values.clone()),
        }
    }
}

/// One requested filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field: String,
    pub value: FilterValue,
}

impl QueryFilter {
    /// Whether `node` passes this filter
    pub fn matches(&self, node: &ContentNode) -> bool {
        node.field_value(&self.field)
            .map(|value| self.value.condition().matches(&value))
            .unwrap_or(false)
    }
}

/// Listing request as received from the API layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub kind: NodeKind,
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    /// Field name, `-` prefix for descending
    pub sort: Option<String>,
    /// 0-based page number
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Owner id whose descendants are listed (strongly consistent)
    pub ancestor: Option<String>,
}

impl QueryRequest {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            sort: None,
            page: None,
            page_size: None,
            ancestor: None,
        }
    }

    /// Require `field == value`
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push(QueryFilter {
            field: field.into(),
            value: FilterValue::Single(value),
        });
        self
    }

    /// Require `field` to be one of `values`
    pub fn filter_any(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.push(QueryFilter {
            field: field.into(),
            value: FilterValue::Many(values),
        });
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn ancestor(mut self, ancestor: impl Into<String>) -> Self {
        self.ancestor = Some(ancestor.into());
        self
    }
}

/// Privilege level of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Public,
    /// May see unlisted nodes
    Elevated,
}

/// Split of requested filters into store-evaluated and in-memory ones
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    /// Filters evaluated by the store
    pub safe: Vec<QueryFilter>,
    /// Filters applied to the fetched page, in demotion order
    pub demoted: Vec<QueryFilter>,
    /// Subquery cost of `safe`
    pub cost: usize,
}

fn total_cost(filters: &[QueryFilter]) -> usize {
    filters
        .iter()
        .fold(1usize, |acc, f| acc.saturating_mul(f.value.cost()))
}

/// Demote largest multi-valued filters until the rest costs at most `max_subqueries`
pub fn plan_filters(filters: Vec<QueryFilter>, max_subqueries: usize) -> FilterPlan {
    let mut safe = filters;
    let mut demoted = Vec::new();
    let mut cost = total_cost(&safe);

    while cost > max_subqueries {
        // First of the largest lists wins ties
        let largest = safe
            .iter()
            .enumerate()
            .filter(|(_, f)| matches!(f.value, FilterValue::Many(_)))
            .fold(None, |best: Option<(usize, usize)>, (i, f)| match best {
                Some((_, size)) if size >= f.value.cost() => best,
                _ => Some((i, f.value.cost())),
            });
        let Some((index, _)) = largest else {
            break;
        };
        demoted.push(safe.remove(index));
        cost = total_cost(&safe);
    }

    FilterPlan {
        safe,
        demoted,
        cost,
    }
}

/// Store query plus the filters left for memory
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub store_query: StoreQuery,
    pub demoted: Vec<QueryFilter>,
}

/// Budgeted query execution
pub struct QueryService {
    store: Arc<dyn NodeStore>,
    config: Arc<CatalogConfig>,
}

impl QueryService {
    pub fn new(store: Arc<dyn NodeStore>, config: Arc<CatalogConfig>) -> Self {
        Self { store, config }
    }

    /// Validate a request and turn it into a store query
    ///
    /// # Errors
    ///
    /// - `InvalidField` if a filter or the sort names a field the kind lacks
    /// - `InvalidPagination` if the page size or offset is negative
    pub fn plan(&self, request: &QueryRequest, caller: Caller) -> CatalogResult<QueryPlan> {
        let spec = request.kind.spec();

        for filter in &request.filters {
            if !spec.has_field(&filter.field) {
                return Err(CatalogError::invalid_field(request.kind, &filter.field));
            }
        }
        let sort = request.sort.as_deref().map(SortOrder::parse);
        if let Some(order) = &sort {
            if !spec.has_field(&order.field) {
                return Err(CatalogError::invalid_field(request.kind, &order.field));
            }
        }

        let (offset, limit) = self.pagination(request)?;

        let plan = plan_filters(request.filters.clone(), self.config.max_subqueries);
        if !plan.demoted.is_empty() {
            let fields: Vec<&str> = plan.demoted.iter().map(|f| f.field.as_str()).collect();
            tracing::warn!(
                "Query on {} over subquery budget, filtering {:?} in memory (remaining cost {})",
                request.kind,
                fields,
                plan.cost
            );
        }

        let mut store_query = StoreQuery::new(request.kind).offset(offset).limit(limit);
        for filter in plan.safe {
            let condition = filter.value.condition();
            store_query = store_query.filter(filter.field, condition);
        }

        store_query = store_query.filter("deleted", FilterCondition::Eq(json!(false)));
        match &request.ancestor {
            Some(ancestor) => {
                store_query = store_query.ancestor(node_id::group_of(ancestor));
            }
            None if caller == Caller::Elevated || !spec.listable => {}
            None => {
                store_query = store_query.filter("listed", FilterCondition::Eq(json!(true)));
            }
        }

        if let Some(order) = sort {
            store_query = store_query.order_by(order);
        }

        Ok(QueryPlan {
            store_query,
            demoted: plan.demoted,
        })
    }

    fn pagination(&self, request: &QueryRequest) -> CatalogResult<(usize, usize)> {
        let page_size = request
            .page_size
            .unwrap_or(self.config.default_page_size as i64);
        let page = request.page.unwrap_or(0);

        let offset = page
            .checked_mul(page_size)
            .ok_or_else(|| CatalogError::invalid_pagination("page offset overflows"))?;
        if page_size < 0 {
            return Err(CatalogError::invalid_pagination(format!(
                "negative page size {}",
                page_size
            )));
        }
        if offset < 0 {
            return Err(CatalogError::invalid_pagination(format!(
                "page {} of size {} gives negative offset {}",
                page, page_size, offset
            )));
        }

        Ok((offset as usize, page_size as usize))
    }

    /// Run a listing request
    ///
    /// Unscoped results are eventually consistent; ancestor-scoped results are
    /// strongly consistent.
    pub async fn query(
        &self,
        request: &QueryRequest,
        caller: Caller,
    ) -> CatalogResult<Vec<ContentNode>> {
        tracing::info!(
            "Querying {} with {} filters (page {:?}, ancestor {:?})",
            request.kind,
            request.filters.len(),
            request.page,
            request.ancestor
        );

        let plan = self.plan(request, caller)?;
        let nodes = self.store.query_nodes(&plan.store_query).await?;

        if plan.demoted.is_empty() {
            return Ok(nodes);
        }

        let fetched = nodes.len();
        let kept: Vec<ContentNode> = nodes
            .into_iter()
            .filter(|node| plan.demoted.iter().all(|filter| filter.matches(node)))
            .collect();
        tracing::debug!("Post-filter kept {} of {} nodes", kept.len(), fetched);
        Ok(kept)
    }
}
