//! Service Layer Error Types
//!
//! This module defines the error type shared by every catalog service. The
//! excluded HTTP layer maps these onto responses: client errors become 4xx,
//! retryable errors become 503, everything else 500.

use crate::db::{IndexError, StoreError};
use crate::models::{NodeKind, ValidationError};
use thiserror::Error;

/// Catalog operation errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The (parent, child) kind pair has no relationship schema entry
    #[error("Unsupported relationship: {parent_kind} -> {child_kind}")]
    UnsupportedRelationship {
        parent_kind: NodeKind,
        child_kind: NodeKind,
    },

    /// The edge already exists
    #[error("{child_id} is already associated with {parent_id}")]
    AlreadyAssociated { parent_id: String, child_id: String },

    /// Transaction retries exhausted
    #[error("Concurrent modification of {context} after {attempts} attempts")]
    ConcurrentModification { context: String, attempts: usize },

    /// Filter or sort on a field the kind does not have
    #[error("Invalid field '{field}' for kind {kind}")]
    InvalidField { kind: NodeKind, field: String },

    /// Page/page size combination that cannot be evaluated
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Node already exists (create with a taken identifier)
    #[error("Node already exists: {id}")]
    NodeExists { id: String },

    /// Validation failed for node
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Configuration or registry rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entity store operation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Search index operation failed
    #[error("Search index operation failed: {0}")]
    Index(#[from] IndexError),
}

impl CatalogError {
    /// Create an unsupported relationship error
    pub fn unsupported_relationship(parent_kind: NodeKind, child_kind: NodeKind) -> Self {
        Self::UnsupportedRelationship {
            parent_kind,
            child_kind,
        }
    }

    /// Create an already associated error
    pub fn already_associated(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self::AlreadyAssociated {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        }
    }

    /// Create a concurrent modification error
    pub fn concurrent_modification(context: impl Into<String>, attempts: usize) -> Self {
        Self::ConcurrentModification {
            context: context.into(),
            attempts,
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(kind: NodeKind, field: impl Into<String>) -> Self {
        Self::InvalidField {
            kind,
            field: field.into(),
        }
    }

    /// Create an invalid pagination error
    pub fn invalid_pagination(msg: impl Into<String>) -> Self {
        Self::InvalidPagination(msg.into())
    }

    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a node exists error
    pub fn node_exists(id: impl Into<String>) -> Self {
        Self::NodeExists { id: id.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the request itself is bad and must not be retried
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedRelationship { .. }
                | Self::AlreadyAssociated { .. }
                | Self::InvalidField { .. }
                | Self::InvalidPagination(_)
                | Self::NodeNotFound { .. }
                | Self::NodeExists { .. }
                | Self::ValidationFailed(_)
        )
    }

    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrentModification { .. } => true,
            Self::Store(err) => matches!(err, StoreError::Unavailable(_) | StoreError::Conflict { .. }),
            Self::Index(err) => matches!(err, IndexError::Unavailable(_)),
            _ => false,
        }
    }
}

/// Result alias for catalog services
pub type CatalogResult<T> = Result<T, CatalogError>;
