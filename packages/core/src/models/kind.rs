//! Node Kind Registry
//!
//! Every content record has a closed, explicit kind. Instead of resolving a
//! kind name to behavior at runtime, each [`NodeKind`] maps to a static
//! [`KindSpec`] describing its fields, their defaults, and how they project
//! into search documents.
//!
//! # Field tables
//!
//! - Built-in fields (`uid`, `kind`, `listed`, `deleted`, `created`, `modified`)
//!   live directly on [`ContentNode`](super::ContentNode)
//! - Everything else lives in the node's JSON properties and is described here
//! - Id-list fields carry relationship ends (see [`super::schema`])

use super::node::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kinds of content records known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Course,
    Topic,
    Lesson,
    Practice,
    Assessment,
    Comment,
}

impl NodeKind {
    /// All kinds, in registry order
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Course,
        NodeKind::Topic,
        NodeKind::Lesson,
        NodeKind::Practice,
        NodeKind::Assessment,
        NodeKind::Comment,
    ];

    /// Kind name as it appears in ids (`Course_abc12345`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Course => "Course",
            NodeKind::Topic => "Topic",
            NodeKind::Lesson => "Lesson",
            NodeKind::Practice => "Practice",
            NodeKind::Assessment => "Assessment",
            NodeKind::Comment => "Comment",
        }
    }

    /// Static field table for this kind
    pub fn spec(&self) -> &'static KindSpec {
        match self {
            NodeKind::Course => &COURSE,
            NodeKind::Topic => &TOPIC,
            NodeKind::Lesson => &LESSON,
            NodeKind::Practice => &PRACTICE,
            NodeKind::Assessment => &ASSESSMENT,
            NodeKind::Comment => &COMMENT,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidNodeKind(s.to_string()))
    }
}

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Text,
    Integer,
    Boolean,
    Timestamp,
    StringList,
    /// Ordered or unordered list of node ids (relationship end)
    IdList,
}

impl FieldType {
    /// Whether the stored value is a JSON array
    pub fn is_repeated(&self) -> bool {
        matches!(self, FieldType::StringList | FieldType::IdList)
    }
}

/// Field type inside a search document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFieldType {
    /// Tokenized full text
    Text,
    /// Exact-match token
    Atom,
    Number,
    Date,
}

/// Definition of one property field
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Default as a JSON literal, parsed on demand
    pub default: &'static str,
    pub search: Option<SearchFieldType>,
}

impl FieldSpec {
    const fn new(
        name: &'static str,
        field_type: FieldType,
        default: &'static str,
        search: Option<SearchFieldType>,
    ) -> Self {
        Self {
            name,
            field_type,
            default,
            search,
        }
    }

    /// Value a node reports when the property was never set
    pub fn default_value(&self) -> Value {
        serde_json::from_str(self.default).unwrap_or(Value::Null)
    }
}

/// Built-in fields present on every node
pub const BUILTIN_FIELDS: [&str; 7] = [
    "uid", "id", "kind", "listed", "deleted", "created", "modified",
];

/// Static description of a kind
#[derive(Debug)]
pub struct KindSpec {
    pub kind: NodeKind,
    /// Whether the kind has a meaningful `listed` flag
    pub listable: bool,
    pub fields: &'static [FieldSpec],
}

impl KindSpec {
    /// Look up a property field by name
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Whether `name` is a built-in or property field of this kind
    pub fn has_field(&self, name: &str) -> bool {
        BUILTIN_FIELDS.contains(&name) || self.field(name).is_some()
    }

    /// Fields that project into search documents
    pub fn search_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|field| field.search.is_some())
    }

    /// Default property object for a fresh node of this kind
    pub fn default_properties(&self) -> serde_json::Map<String, Value> {
        self.fields
            .iter()
            .map(|field| (field.name.to_string(), field.default_value()))
            .collect()
    }
}

use FieldType as F;
use SearchFieldType as S;

macro_rules! content_fields {
    ($($extra:expr),* $(,)?) => {
        &[
            FieldSpec::new("name", F::String, "\"\"", Some(S::Text)),
            FieldSpec::new("summary", F::Text, "\"\"", Some(S::Text)),
            FieldSpec::new("tags", F::StringList, "[]", Some(S::Atom)),
            FieldSpec::new("subjects", F::StringList, "[]", Some(S::Atom)),
            FieldSpec::new("min_grade", F::Integer, "0", Some(S::Number)),
            FieldSpec::new("max_grade", F::Integer, "13", Some(S::Number)),
            FieldSpec::new("promoted", F::Boolean, "false", Some(S::Atom)),
            $($extra),*
        ]
    };
}

static COURSE: KindSpec = KindSpec {
    kind: NodeKind::Course,
    listable: true,
    fields: content_fields![
        FieldSpec::new("topics", F::IdList, "[]", None),
        FieldSpec::new("popular_lessons", F::IdList, "[]", None),
        FieldSpec::new("color", F::String, "\"#666666\"", None),
        FieldSpec::new("estimated_duration", F::Integer, "0", None),
        FieldSpec::new("lesson_count", F::Integer, "0", None),
        FieldSpec::new("target_audience", F::String, "null", None),
        FieldSpec::new("locale", F::String, "\"en\"", None),
    ],
};

static TOPIC: KindSpec = KindSpec {
    kind: NodeKind::Topic,
    listable: true,
    fields: content_fields![
        FieldSpec::new("courses", F::IdList, "[]", None),
        FieldSpec::new("lessons", F::IdList, "[]", None),
        FieldSpec::new("color", F::String, "\"#666666\"", None),
    ],
};

static LESSON: KindSpec = KindSpec {
    kind: NodeKind::Lesson,
    listable: true,
    fields: content_fields![
        FieldSpec::new("topics", F::IdList, "[]", None),
        FieldSpec::new("popular_in", F::IdList, "[]", None),
        FieldSpec::new("type", F::String, "\"text\"", Some(S::Atom)),
        FieldSpec::new("youtube_id", F::String, "\"\"", None),
        FieldSpec::new("wistia_id", F::String, "\"\"", None),
        FieldSpec::new("votes_for", F::Integer, "0", Some(S::Number)),
        FieldSpec::new("num_comments", F::Integer, "0", Some(S::Number)),
    ],
};

static PRACTICE: KindSpec = KindSpec {
    kind: NodeKind::Practice,
    listable: true,
    fields: content_fields![
        FieldSpec::new("body", F::Text, "\"\"", Some(S::Text)),
        FieldSpec::new("pending", F::Boolean, "true", Some(S::Atom)),
        FieldSpec::new("votes_for", F::Integer, "0", Some(S::Number)),
        FieldSpec::new("num_comments", F::Integer, "0", Some(S::Number)),
    ],
};

static ASSESSMENT: KindSpec = KindSpec {
    kind: NodeKind::Assessment,
    listable: true,
    fields: content_fields![
        FieldSpec::new("url_name", F::String, "\"\"", Some(S::Atom)),
        FieldSpec::new("num_phrases", F::Integer, "0", None),
    ],
};

static COMMENT: KindSpec = KindSpec {
    kind: NodeKind::Comment,
    listable: false,
    fields: &[
        FieldSpec::new("body", F::Text, "\"\"", None),
        FieldSpec::new("practice_id", F::String, "null", None),
        FieldSpec::new("lesson_id", F::String, "null", None),
    ],
};

/// Fresh property object for `kind`, with `overrides` applied on top
pub fn properties_for(kind: NodeKind, overrides: Value) -> serde_json::Map<String, Value> {
    let mut properties = kind.spec().default_properties();
    if let Value::Object(map) = overrides {
        properties.extend(map);
    }
    properties
}
