//! Catalog - Service Wiring
//!
//! Builds every catalog service over one shared store and index, after
//! checking the configuration and the static kind/relationship tables.
//!
//! # Examples
//!
//! ```rust
//! use catalog_core::config::CatalogConfig;
//! use catalog_core::db::{InMemorySearchIndex, InMemoryStore};
//! use catalog_core::services::Catalog;
//! use std::sync::Arc;
//!
//! let catalog = Catalog::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(InMemorySearchIndex::new()),
//!     CatalogConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(catalog.config().max_subqueries, 30);
//! ```

use crate::config::CatalogConfig;
use crate::db::{NodeStore, SearchIndex};
use crate::models::schema;
use crate::services::error::{CatalogError, CatalogResult};
use crate::services::index_sync::IndexSynchronizer;
use crate::services::node_service::NodeService;
use crate::services::query_service::QueryService;
use crate::services::reconcile_processor::{ReconcileProcessor, ReconcileWaker};
use crate::services::relationship_service::RelationshipService;
use std::sync::Arc;
use std::time::Duration;

/// Entry point handed to the API layer
pub struct Catalog {
    config: Arc<CatalogConfig>,
    nodes: Arc<NodeService>,
    relationships: Arc<RelationshipService>,
    queries: Arc<QueryService>,
    index_sync: Arc<IndexSynchronizer>,
}

impl Catalog {
    /// Validate `config` and the registries, then wire the services
    pub fn new(
        store: Arc<dyn NodeStore>,
        index: Arc<dyn SearchIndex>,
        config: CatalogConfig,
    ) -> CatalogResult<Self> {
        let config = Self::checked(config)?;
        let index_sync = Arc::new(IndexSynchronizer::new(store.clone(), index, config.clone()));
        Ok(Self::assemble(store, config, index_sync, None))
    }

    /// Like [`Catalog::new`], and start a background reconcile processor
    ///
    /// The processor shares the catalog's synchronizer, so its runs never
    /// overlap with manual ones. Batch writes wake it. Must be called within
    /// a tokio runtime.
    pub fn with_processor(
        store: Arc<dyn NodeStore>,
        index: Arc<dyn SearchIndex>,
        config: CatalogConfig,
    ) -> CatalogResult<(Self, ReconcileProcessor)> {
        let config = Self::checked(config)?;
        let index_sync = Arc::new(IndexSynchronizer::new(store.clone(), index, config.clone()));
        let processor = ReconcileProcessor::start(
            index_sync.clone(),
            Duration::from_secs(config.reconcile_interval_secs),
            config.reconcile_batch_size,
        );
        let catalog = Self::assemble(store, config, index_sync, Some(processor.waker()));
        Ok((catalog, processor))
    }

    fn checked(config: CatalogConfig) -> CatalogResult<Arc<CatalogConfig>> {
        config.validate().map_err(CatalogError::invalid_config)?;
        schema::validate_registry().map_err(CatalogError::invalid_config)?;
        Ok(Arc::new(config))
    }

    fn assemble(
        store: Arc<dyn NodeStore>,
        config: Arc<CatalogConfig>,
        index_sync: Arc<IndexSynchronizer>,
        waker: Option<ReconcileWaker>,
    ) -> Self {
        let relationships = Arc::new(RelationshipService::new(
            store.clone(),
            index_sync.clone(),
            config.clone(),
        ));
        let queries = Arc::new(QueryService::new(store.clone(), config.clone()));

        let mut nodes = NodeService::new(
            store,
            index_sync.clone(),
            relationships.clone(),
            config.clone(),
        );
        if let Some(waker) = waker {
            nodes = nodes.with_reconcile_waker(waker);
        }

        tracing::info!(
            "Catalog ready (index {}, indexed kinds {:?})",
            config.content_index,
            config.indexed_kinds
        );

        Self {
            config,
            nodes: Arc::new(nodes),
            relationships,
            queries,
            index_sync,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn nodes(&self) -> &Arc<NodeService> {
        &self.nodes
    }

    pub fn relationships(&self) -> &Arc<RelationshipService> {
        &self.relationships
    }

    pub fn queries(&self) -> &Arc<QueryService> {
        &self.queries
    }

    pub fn index_sync(&self) -> &Arc<IndexSynchronizer> {
        &self.index_sync
    }
}
