/// Configuration for the content catalog
use crate::models::NodeKind;
use serde::{Deserialize, Serialize};

/// Subquery budget of the primitive store
pub const DEFAULT_MAX_SUBQUERIES: usize = 30;

/// Catalog-wide settings shared by every service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Maximum equality subqueries one primitive query may expand into
    pub max_subqueries: usize,

    /// Page size used when a query does not ask for one
    pub default_page_size: usize,

    /// Per-kind cap on nodes processed by one reconcile run
    pub reconcile_batch_size: usize,

    /// Page size used while walking a kind during a full reindex
    pub reindex_page_size: usize,

    /// Attempts per relationship transaction before giving up
    pub transaction_attempts: usize,

    /// Name of the search index holding content documents
    pub content_index: String,

    /// Key of the persisted reconcile checkpoint
    pub checkpoint_name: String,

    /// Kinds mirrored into the search index
    pub indexed_kinds: Vec<NodeKind>,

    /// Period of the background reconcile processor
    pub reconcile_interval_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_subqueries: DEFAULT_MAX_SUBQUERIES,
            default_page_size: 20,
            reconcile_batch_size: 10,
            reindex_page_size: 100,
            transaction_attempts: 3,
            content_index: "content_2015".to_string(),
            checkpoint_name: "the-indexer".to_string(),
            indexed_kinds: vec![NodeKind::Lesson, NodeKind::Practice, NodeKind::Assessment],
            reconcile_interval_secs: 300,
        }
    }
}

impl CatalogConfig {
    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("invalid catalog config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Whether documents of `kind` belong in the search index
    pub fn is_indexed(&self, kind: NodeKind) -> bool {
        self.indexed_kinds.contains(&kind)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_subqueries == 0 {
            return Err("max_subqueries must be greater than 0".to_string());
        }

        if self.default_page_size == 0 {
            return Err("default_page_size must be greater than 0".to_string());
        }

        if self.reconcile_batch_size == 0 {
            return Err("reconcile_batch_size must be greater than 0".to_string());
        }

        if self.reindex_page_size == 0 {
            return Err("reindex_page_size must be greater than 0".to_string());
        }

        if self.transaction_attempts == 0 {
            return Err("transaction_attempts must be greater than 0".to_string());
        }

        if self.content_index.is_empty() {
            return Err("content_index cannot be empty".to_string());
        }

        if self.checkpoint_name.is_empty() {
            return Err("checkpoint_name cannot be empty".to_string());
        }

        if let Some(kind) = self.indexed_kinds.iter().find(|k| !k.spec().listable) {
            return Err(format!(
                "{} cannot be indexed: the kind has no listed flag",
                kind
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.max_subqueries, 30);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.reconcile_batch_size, 10);
        assert_eq!(config.checkpoint_name, "the-indexer");
        assert!(config.is_indexed(NodeKind::Lesson));
        assert!(!config.is_indexed(NodeKind::Course));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CatalogConfig::default();

        config.transaction_attempts = 0;
        assert!(config.validate().is_err());

        config.transaction_attempts = 3;
        config.content_index = String::new();
        assert!(config.validate().is_err());

        // Comments are never listed, so they can never be searchable
        config.content_index = "content".to_string();
        config.indexed_kinds.push(NodeKind::Comment);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            CatalogConfig::from_json_str(r#"{"reconcile_batch_size": 5, "indexed_kinds": ["Lesson"]}"#)
                .unwrap();
        assert_eq!(config.reconcile_batch_size, 5);
        assert_eq!(config.indexed_kinds, vec![NodeKind::Lesson]);
        assert_eq!(config.max_subqueries, 30);

        assert!(CatalogConfig::from_json_str(r#"{"max_subqueries": 0}"#).is_err());
    }
}
