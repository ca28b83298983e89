//! Content Node
//!
//! This module defines [`ContentNode`], the single record type shared by every
//! kind in the catalog (courses, topics, lessons, practices, ...).
//!
//! # Architecture
//!
//! - **Universal record**: one struct for all kinds, discriminated by `kind`
//! - **JSON properties**: kind-specific fields live in `properties`, described
//!   by the static registry in [`super::kind`]
//! - **Id lists, not pointers**: relationship ends are plain lists of ids
//!   stored as properties and resolved by lookup
//! - **Store-managed metadata**: `modified_at` and `version` are stamped by the
//!   entity store on every write
//!
//! # Examples
//!
//! ```rust
//! use catalog_core::models::{ContentNode, NodeKind};
//! use serde_json::json;
//!
//! let lesson = ContentNode::new(NodeKind::Lesson, json!({"name": "Praise effort"})).unwrap();
//! assert!(lesson.id.starts_with("Lesson_"));
//! assert_eq!(lesson.property("type"), json!("text"));
//! ```

use super::kind::{self, NodeKind};
use super::node_id;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Validation errors for node construction and ids
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node kind: {0}")]
    InvalidNodeKind(String),

    #[error("Invalid node id: {0}")]
    InvalidId(String),

    #[error("Invalid identifier: {0}. Letters, numbers, and hyphens only.")]
    InvalidIdentifier(String),

    #[error("Node {id} is of kind {actual}, expected {expected}")]
    KindMismatch {
        id: String,
        expected: NodeKind,
        actual: NodeKind,
    },

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),
}

/// Earliest representable timestamp (0001-01-01T00:00:00Z)
pub fn min_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Timestamp as a comparable field value
///
/// Fixed-width RFC 3339 with microseconds, so lexical order equals time order.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// A record in the content graph
///
/// # Fields
///
/// - `id`: globally unique, encodes kind and ownership (see [`node_id`])
/// - `kind`: fixed at creation
/// - `listed`: only listed nodes appear in unscoped queries and the search index
/// - `deleted`: soft-delete flag
/// - `created_at` / `modified_at`: `modified_at` is the synchronization high-water mark
/// - `version`: optimistic concurrency counter, 0 until first persisted
/// - `properties`: kind-specific fields, including relationship id lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub listed: bool,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ContentNode {
    /// Create an unsaved node with a generated id and registry defaults
    pub fn new(kind: NodeKind, properties: Value) -> Result<Self, ValidationError> {
        let id = node_id::generate(kind, None, None)?;
        Ok(Self::build(id, kind, properties))
    }

    /// Create an unsaved node with an explicit id
    ///
    /// The kind is read from the id prefix.
    pub fn with_id(id: impl Into<String>, properties: Value) -> Result<Self, ValidationError> {
        let id = id.into();
        let kind = node_id::kind_of(&id)?;
        Ok(Self::build(id, kind, properties))
    }

    fn build(id: String, kind: NodeKind, properties: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            listed: false,
            deleted: false,
            created_at: now,
            modified_at: now,
            version: 0,
            properties: kind::properties_for(kind, properties),
        }
    }

    /// Builder-style toggle for `listed`
    pub fn listed(mut self, listed: bool) -> Self {
        self.listed = listed;
        self
    }

    /// Ownership group this node belongs to
    pub fn group_id(&self) -> &str {
        node_id::group_of(&self.id)
    }

    /// Whether the node should currently be visible to search
    pub fn is_searchable(&self) -> bool {
        self.listed && !self.deleted
    }

    /// Property value, falling back to the registry default
    pub fn property(&self, name: &str) -> Value {
        match self.properties.get(name) {
            Some(value) => value.clone(),
            None => self
                .kind
                .spec()
                .field(name)
                .map(|field| field.default_value())
                .unwrap_or(Value::Null),
        }
    }

    /// Set a property value
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    /// Ids stored in an id-list field (empty when unset)
    pub fn id_list(&self, field: &str) -> Vec<String> {
        match self.properties.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Replace an id-list field
    pub fn set_id_list(&mut self, field: &str, ids: Vec<String>) {
        self.properties.insert(
            field.to_string(),
            Value::Array(ids.into_iter().map(Value::String).collect()),
        );
    }

    /// Value of a built-in or property field, `None` if the kind has no such field
    pub fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "uid" | "id" => Some(Value::String(self.id.clone())),
            "kind" => Some(Value::String(self.kind.as_str().to_string())),
            "listed" => Some(Value::Bool(self.listed)),
            "deleted" => Some(Value::Bool(self.deleted)),
            "created" => Some(timestamp_value(self.created_at)),
            "modified" => Some(timestamp_value(self.modified_at)),
            _ => self
                .kind
                .spec()
                .field(name)
                .map(|_| self.property(name)),
        }
    }

    /// Validate structure
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is empty or does not encode `kind`
    /// - a property that the registry declares as a list is not an array
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        let encoded = node_id::kind_of(&self.id)?;
        if encoded != self.kind {
            return Err(ValidationError::KindMismatch {
                id: self.id.clone(),
                expected: self.kind,
                actual: encoded,
            });
        }

        for field in self.kind.spec().fields {
            if let Some(value) = self.properties.get(field.name) {
                if field.field_type.is_repeated() && !value.is_array() {
                    return Err(ValidationError::InvalidProperties(format!(
                        "{} must be a list",
                        field.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_nodes_are_unlisted_and_unsaved() {
        let node = ContentNode::new(NodeKind::Course, json!({"name": "Growth"})).unwrap();
        assert!(!node.listed);
        assert!(!node.deleted);
        assert_eq!(node.version, 0);
        assert_eq!(node.property("name"), json!("Growth"));
        assert_eq!(node.property("color"), json!("#666666"));
    }

    #[test]
    fn with_id_reads_kind_from_prefix() {
        let node = ContentNode::with_id("Topic_T", json!({})).unwrap();
        assert_eq!(node.kind, NodeKind::Topic);
        assert!(ContentNode::with_id("Nothing", json!({})).is_err());
    }

    #[test]
    fn id_lists_round_trip_through_properties() {
        let mut course = ContentNode::with_id("Course_A", json!({})).unwrap();
        assert!(course.id_list("topics").is_empty());
        course.set_id_list("topics", vec!["Topic_1".into(), "Topic_2".into()]);
        assert_eq!(course.id_list("topics"), vec!["Topic_1", "Topic_2"]);
    }

    #[test]
    fn field_value_covers_builtins_and_defaults() {
        let lesson = ContentNode::with_id("Lesson_L", json!({"tags": ["a"]}))
            .unwrap()
            .listed(true);
        assert_eq!(lesson.field_value("listed"), Some(json!(true)));
        assert_eq!(lesson.field_value("uid"), Some(json!("Lesson_L")));
        assert_eq!(lesson.field_value("tags"), Some(json!(["a"])));
        assert_eq!(lesson.field_value("votes_for"), Some(json!(0)));
        assert_eq!(lesson.field_value("no_such_field"), None);
    }

    #[test]
    fn timestamp_values_sort_lexically() {
        let early = timestamp_value(min_timestamp());
        let late = timestamp_value(Utc::now());
        assert!(early.as_str().unwrap() < late.as_str().unwrap());
    }

    #[test]
    fn validate_rejects_scalar_lists_and_kind_mismatch() {
        let mut node = ContentNode::with_id("Course_A", json!({})).unwrap();
        node.set_property("topics", json!("Topic_1"));
        assert!(node.validate().is_err());

        let mut node = ContentNode::with_id("Course_A", json!({})).unwrap();
        node.kind = NodeKind::Topic;
        assert!(matches!(
            node.validate(),
            Err(ValidationError::KindMismatch { .. })
        ));
    }
}
