//! Adapter Error Types
//!
//! Errors reported by the entity store and search index adapters. Service
//! code decides which of these are retried, swallowed, or surfaced.

use thiserror::Error;

/// Entity store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A record read inside a transaction changed before commit
    #[error("Transaction conflict on: {}", ids.join(", "))]
    Conflict { ids: Vec<String> },

    /// A transaction touched a record outside its declared groups
    #[error("Record {id} belongs to group {group}, which is not part of the transaction")]
    GroupNotEnlisted { id: String, group: String },

    /// Too many entity groups in one transaction
    #[error("Transaction spans {requested} groups, the store allows {max}")]
    TooManyGroups { requested: usize, max: usize },

    /// Query expands into more equality subqueries than the store evaluates
    #[error("Query needs {subqueries} subqueries, the store allows {max}")]
    QueryTooComplex { subqueries: usize, max: usize },

    /// Store could not be reached or timed out (transient)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a conflict error
    pub fn conflict(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Conflict {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a group-not-enlisted error
    pub fn group_not_enlisted(id: impl Into<String>, group: impl Into<String>) -> Self {
        Self::GroupNotEnlisted {
            id: id.into(),
            group: group.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether retrying the whole transaction may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Search index errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// Index service could not be reached (transient)
    #[error("Search index unavailable: {0}")]
    Unavailable(String),

    /// Index refused a document
    #[error("Search index rejected document {id}: {reason}")]
    DocumentRejected { id: String, reason: String },
}

impl IndexError {
    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a document rejected error
    pub fn document_rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentRejected {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
