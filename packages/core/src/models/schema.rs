//! Relationship Schema
//!
//! Static table of the parent/child associations the catalog allows. Each
//! relation names the id-list field on the parent (ordered children) and on
//! the child (unordered parents).
//!
//! | parent | child  | child list        | parent list  |
//! |--------|--------|-------------------|--------------|
//! | Course | Topic  | `topics`          | `courses`    |
//! | Topic  | Lesson | `lessons`         | `topics`     |
//! | Course | Lesson | `popular_lessons` | `popular_in` |

use super::kind::{FieldType, NodeKind};

/// One allowed (parent kind, child kind) association
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub parent_kind: NodeKind,
    pub child_kind: NodeKind,
    /// Ordered list of child ids on the parent
    pub child_list: &'static str,
    /// Set of parent ids on the child
    pub parent_list: &'static str,
}

/// All allowed relations
pub static RELATIONS: &[Relation] = &[
    Relation {
        parent_kind: NodeKind::Course,
        child_kind: NodeKind::Topic,
        child_list: "topics",
        parent_list: "courses",
    },
    Relation {
        parent_kind: NodeKind::Topic,
        child_kind: NodeKind::Lesson,
        child_list: "lessons",
        parent_list: "topics",
    },
    Relation {
        parent_kind: NodeKind::Course,
        child_kind: NodeKind::Lesson,
        child_list: "popular_lessons",
        parent_list: "popular_in",
    },
];

/// Relation for a (parent, child) kind pair, if one is declared
pub fn relation_for(parent_kind: NodeKind, child_kind: NodeKind) -> Option<&'static Relation> {
    RELATIONS
        .iter()
        .find(|relation| relation.parent_kind == parent_kind && relation.child_kind == child_kind)
}

/// Check that every relation points at id-list fields of the right kinds
///
/// Run once at startup; a failure is a programming error in the tables.
pub fn validate_registry() -> Result<(), String> {
    for relation in RELATIONS {
        check_id_list(relation.parent_kind, relation.child_list)?;
        check_id_list(relation.child_kind, relation.parent_list)?;
    }

    for (i, a) in RELATIONS.iter().enumerate() {
        for b in &RELATIONS[i + 1..] {
            if a.parent_kind == b.parent_kind && a.child_kind == b.child_kind {
                return Err(format!(
                    "duplicate relation ({}, {})",
                    a.parent_kind, a.child_kind
                ));
            }
        }
    }

    Ok(())
}

fn check_id_list(kind: NodeKind, field: &str) -> Result<(), String> {
    match kind.spec().field(field) {
        Some(spec) if spec.field_type == FieldType::IdList => Ok(()),
        Some(_) => Err(format!("{}.{} is not an id list", kind, field)),
        None => Err(format!("{} has no field {}", kind, field)),
    }
}
