//! Storage Layer
//!
//! This module holds the adapter seams the catalog talks through:
//!
//! - [`NodeStore`] - primitive keyed entity store with filtered queries,
//!   optimistic multi-group commits and checkpoint records
//! - [`Transaction`] - read-modify-write unit built on `NodeStore::commit`
//! - [`SearchIndex`] - external full-text index
//!
//! # Architecture
//!
//! Both collaborators are external services. The catalog only depends on the
//! traits; [`InMemoryStore`] and [`InMemorySearchIndex`] are reference
//! implementations that enforce the same limits (subquery budget, transaction
//! group count, version checks) a remote backend would.

mod error;
mod memory_index;
mod memory_store;
mod node_store;
mod search_index;
mod transaction;

pub use error::{IndexError, IndexResult, StoreError, StoreResult};
pub use memory_index::{InMemorySearchIndex, SCAN_PAGE_SIZE};
pub use memory_store::{InMemoryStore, DEFAULT_MAX_SUBQUERIES, DEFAULT_MAX_TRANSACTION_GROUPS};
pub use node_store::{
    compare_values, CommitRequest, FilterCondition, NodeStore, SortOrder, StoreFilter, StoreQuery,
};
pub use search_index::{IdPage, SearchIndex};
pub use transaction::Transaction;
