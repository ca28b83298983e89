//! Catalog Core Business Logic Layer
//!
//! This crate keeps a hierarchical content graph, a budgeted query layer and a
//! secondary full-text search index mutually consistent on top of a primitive
//! store that offers only small transactions and eventually-consistent queries.
//!
//! # Architecture
//!
//! - **Id lists, not pointers**: parent/child edges are id lists on both ends
//! - **Closed kind registry**: every kind and its fields are a static table
//! - **Optimistic transactions**: multi-group edits commit against observed versions
//! - **Lagging index**: search documents follow writes reactively and through a
//!   checkpointed catch-up job
//!
//! # Modules
//!
//! - [`models`] - Data structures (ContentNode, kinds, relations, search documents)
//! - [`db`] - Store and index adapter traits with in-memory implementations
//! - [`services`] - Business services (relationships, queries, index sync, nodes)
//! - [`config`] - Catalog configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::CatalogConfig;
pub use models::*;
pub use services::*;
