//! Business Services
//!
//! This module contains the catalog's business logic:
//!
//! - `RelationshipService` - Bidirectional graph edits (associate, disassociate, reorder)
//! - `QueryService` - Filtered listings under the store's subquery budget
//! - `IndexSynchronizer` - Search index mirroring (reactive hook, reconcile, reindex, purge)
//! - `ReconcileProcessor` - Background task running reconcile on a timer or on demand
//! - `NodeService` - Single-node CRUD wired to the reactive index hook
//! - `Catalog` - Wiring of all of the above over shared adapters
//!
//! Services coordinate between the storage adapters and the excluded API
//! layer, implementing business rules and transaction scoping.

pub mod catalog;
pub mod error;
pub mod index_sync;
pub mod node_service;
pub mod query_service;
pub mod reconcile_processor;
pub mod relationship_service;
pub mod search_query;

pub use catalog::Catalog;
pub use error::{CatalogError, CatalogResult};
pub use index_sync::{IndexSynchronizer, ReconcileReport};
pub use node_service::{CreateNodeParams, NodeService};
pub use query_service::{Caller, FilterValue, QueryFilter, QueryRequest, QueryService};
pub use reconcile_processor::{ReconcileProcessor, ReconcileWaker};
pub use relationship_service::{Direction, RelationshipService};
pub use search_query::build_query_string;
