//! Data Models
//!
//! This module contains the core data structures of the content catalog:
//!
//! - [`ContentNode`] - Universal record for every content kind
//! - [`NodeKind`] / [`KindSpec`] - Closed kind registry with field tables
//! - [`Relation`] - Allowed parent/child associations
//! - [`SearchDocument`] - Projection of a node into the search index
//! - [`Checkpoint`] - Persisted high-water mark of index synchronization

mod checkpoint;
pub mod kind;
mod node;
pub mod node_id;
pub mod schema;
mod search_document;

pub use checkpoint::Checkpoint;
pub use kind::{FieldSpec, FieldType, KindSpec, NodeKind, SearchFieldType};
pub use node::{min_timestamp, timestamp_value, ContentNode, ValidationError};
pub use schema::{relation_for, Relation};
pub use search_document::{SearchDocument, SearchField};
