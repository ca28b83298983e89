//! Search Documents
//!
//! Projection of a node's searchable fields into the shape the external
//! full-text index accepts. Node ids are globally unique, so they double as
//! document ids.

use super::kind::{NodeKind, SearchFieldType};
use super::node::{timestamp_value, ContentNode};
use super::node_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single named, typed value in a document
///
/// Field names are not unique: list properties expand into one field per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: SearchFieldType,
    pub value: Value,
}

/// Document stored in the content index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub doc_id: String,
    pub language: String,
    pub fields: Vec<SearchField>,
}

impl SearchDocument {
    /// Build the document for `node`
    pub fn from_node(node: &ContentNode) -> Self {
        let mut fields = vec![
            SearchField {
                name: "short_uid".to_string(),
                field_type: SearchFieldType::Atom,
                value: Value::String(node_id::to_short(&node.id).to_string()),
            },
            SearchField {
                name: "created".to_string(),
                field_type: SearchFieldType::Date,
                value: timestamp_value(node.created_at),
            },
            SearchField {
                name: "modified".to_string(),
                field_type: SearchFieldType::Date,
                value: timestamp_value(node.modified_at),
            },
        ];

        for spec in node.kind.spec().search_fields() {
            let Some(field_type) = spec.search else {
                continue;
            };
            let values = match node.property(spec.name) {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                value => vec![value],
            };
            for value in values {
                fields.push(SearchField {
                    name: spec.name.to_string(),
                    field_type,
                    value: atom_value(field_type, value),
                });
            }
        }

        if node.kind == NodeKind::Lesson && node.property("type") == Value::from("video") {
            fields.push(SearchField {
                name: "content_type".to_string(),
                field_type: SearchFieldType::Atom,
                value: Value::from("video"),
            });
        }

        Self {
            doc_id: node.id.clone(),
            language: "en".to_string(),
            fields,
        }
    }

    /// All values of fields named `name`
    pub fn values(&self, name: &str) -> Vec<&Value> {
        self.fields
            .iter()
            .filter(|field| field.name == name)
            .map(|field| &field.value)
            .collect()
    }
}

/// Booleans in atom fields are stored as "true"/"false"
fn atom_value(field_type: SearchFieldType, value: Value) -> Value {
    match (field_type, value) {
        (SearchFieldType::Atom, Value::Bool(flag)) => {
            Value::String(if flag { "true" } else { "false" }.to_string())
        }
        (_, value) => value,
    }
}
