//! Node Identifiers
//!
//! Ids encode the record's kind and, for records owned by another record,
//! the owner's id. An id is always sufficient to look a record up directly.
//!
//! - Root records: `Course_mW4iQ4cO`, `Course_growth-mindset`
//! - Owned records: `Comment_p46aOHS6.User_80h41Q4c`
//!
//! The ownership group (the transactional scope the store uses) is the last
//! dot-separated segment, i.e. the outermost owner.

use super::kind::NodeKind;
use super::node::ValidationError;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Length of generated identifiers
pub const GENERATED_IDENTIFIER_LEN: usize = 8;

/// Letters, numbers, and hyphens only
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z0-9\-]+$";

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Whether `identifier` may be used as the suffix of an id
pub fn is_valid_identifier(identifier: &str) -> bool {
    let regex = IDENTIFIER_REGEX.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).unwrap());
    regex.is_match(identifier)
}

/// Build an id for a new record
///
/// Uses `identifier` when supplied (validated), otherwise eight random
/// alphanumerics. `owner` appends the owning record's id.
pub fn generate(
    kind: NodeKind,
    identifier: Option<&str>,
    owner: Option<&str>,
) -> Result<String, ValidationError> {
    let suffix = match identifier {
        Some(identifier) if is_valid_identifier(identifier) => identifier.to_string(),
        Some(identifier) => {
            return Err(ValidationError::InvalidIdentifier(identifier.to_string()));
        }
        None => {
            let mut random = Uuid::new_v4().simple().to_string();
            random.truncate(GENERATED_IDENTIFIER_LEN);
            random
        }
    };

    let mut id = format!("{}_{}", kind, suffix);
    if let Some(owner) = owner {
        id.push('.');
        id.push_str(owner);
    }
    Ok(id)
}

/// Kind encoded in an id
pub fn kind_of(id: &str) -> Result<NodeKind, ValidationError> {
    let (kind, rest) = id
        .split_once('_')
        .ok_or_else(|| ValidationError::InvalidId(id.to_string()))?;
    if rest.is_empty() {
        return Err(ValidationError::InvalidId(id.to_string()));
    }
    kind.parse()
}

/// Ownership group of an id (its outermost owner, or itself for roots)
pub fn group_of(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

/// Id of the direct owner, if the record is owned
pub fn owner_of(id: &str) -> Option<&str> {
    id.split_once('.').map(|(_, owner)| owner)
}

/// Strip the kind prefix: `Course_growth` becomes `growth`
pub fn to_short(id: &str) -> &str {
    match id.split_once('_') {
        Some((_, short)) => short,
        None => id,
    }
}

/// Accept a short or long id and return the long form for `kind`
pub fn to_long(kind: NodeKind, short_or_long: &str) -> Result<String, ValidationError> {
    if short_or_long.contains('_') {
        Ok(short_or_long.to_string())
    } else {
        generate(kind, Some(short_or_long), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_kind_prefix() {
        let id = generate(NodeKind::Lesson, None, None).unwrap();
        assert!(id.starts_with("Lesson_"));
        assert_eq!(to_short(&id).len(), GENERATED_IDENTIFIER_LEN);
        assert_eq!(kind_of(&id).unwrap(), NodeKind::Lesson);
    }

    #[test]
    fn supplied_identifiers_are_validated() {
        assert_eq!(
            generate(NodeKind::Course, Some("growth-mindset"), None).unwrap(),
            "Course_growth-mindset"
        );
        assert!(generate(NodeKind::Course, Some("not valid!"), None).is_err());
        assert!(generate(NodeKind::Course, Some(""), None).is_err());
    }

    #[test]
    fn owned_ids_resolve_group_and_owner() {
        let id = generate(NodeKind::Comment, Some("p46aOHS6"), Some("Practice_x.User_y")).unwrap();
        assert_eq!(id, "Comment_p46aOHS6.Practice_x.User_y");
        assert_eq!(group_of(&id), "User_y");
        assert_eq!(owner_of(&id), Some("Practice_x.User_y"));
        assert_eq!(group_of("Course_A"), "Course_A");
        assert_eq!(owner_of("Course_A"), None);
    }

    #[test]
    fn short_and_long_forms_convert() {
        assert_eq!(to_short("Course_growth"), "growth");
        assert_eq!(to_long(NodeKind::Course, "growth").unwrap(), "Course_growth");
        assert_eq!(to_long(NodeKind::Course, "Course_growth").unwrap(), "Course_growth");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(kind_of("nounderscore").is_err());
        assert!(kind_of("Course_").is_err());
        assert!(kind_of("Theme_abc").is_err());
    }
}
