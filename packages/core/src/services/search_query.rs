//! Search Query Strings
//!
//! Turns the tags, toggles and free text a user picks in the UI into the
//! query language of the content index:
//!
//! ```text
//! max_grade >= 3 AND (tags: "foo" OR tags: "bar") AND (subjects: "math") my AND search
//! ```
//!
//! Values of one field are OR-ed, fields are AND-ed. `min_grade`/`max_grade`
//! become overlap inequalities against the content's grade range. Free text
//! goes last, unlabeled, so it acts as full-text search.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Characters stripped from free text
const UNSAFE_TEXT_PATTERN: &str = r"[(){}<>]";

static UNSAFE_TEXT_REGEX: OnceLock<Regex> = OnceLock::new();

/// Build the index query string for a set of UI search parameters
///
/// `q` holds the free text; every other key is a field name mapping to one
/// value or a list of values. Empty lists are ignored.
pub fn build_query_string(params: &Map<String, Value>) -> String {
    let regex = UNSAFE_TEXT_REGEX.get_or_init(|| Regex::new(UNSAFE_TEXT_PATTERN).unwrap());

    let text = params.get("q").map(plain).unwrap_or_default();
    let text = regex.replace_all(&text, "").replace(' ', " AND ");

    let mut clauses = Vec::new();
    if let Some(min_grade) = params.get("min_grade") {
        clauses.push(format!("max_grade >= {}", plain(min_grade)));
    }
    if let Some(max_grade) = params.get("max_grade") {
        clauses.push(format!("min_grade <= {}", plain(max_grade)));
    }

    for (field, values) in params {
        if matches!(field.as_str(), "q" | "min_grade" | "max_grade") {
            continue;
        }
        let values = match values {
            Value::Array(items) => items.iter().collect(),
            value => vec![value],
        };
        if values.is_empty() {
            continue;
        }
        let alternatives: Vec<String> = values
            .into_iter()
            .map(|value| format!("{}: \"{}\"", field, plain(value).to_lowercase()))
            .collect();
        clauses.push(format!("({})", alternatives.join(" OR ")));
    }

    let query = clauses.join(" AND ");
    tracing::debug!("Search query string: {} {}", query, text);

    match (query.is_empty(), text.is_empty()) {
        (true, _) => text,
        (false, true) => query,
        (false, false) => format!("{} {}", query, text),
    }
}

/// Value as bare text (strings without quotes)
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn fields_are_anded_and_values_ored() {
        let query = build_query_string(&params(json!({
            "tags": ["Foo", "bar"],
            "subjects": "Math",
        })));
        assert_eq!(
            query,
            r#"(subjects: "math") AND (tags: "foo" OR tags: "bar")"#
        );
    }

    #[test]
    fn grades_become_overlap_inequalities() {
        let query = build_query_string(&params(json!({"min_grade": 3, "max_grade": "8"})));
        assert_eq!(query, "max_grade >= 3 AND min_grade <= 8");
    }

    #[test]
    fn free_text_is_sanitized_and_appended() {
        let query = build_query_string(&params(json!({
            "q": "growth (mindset)",
            "tags": ["praise"],
        })));
        assert_eq!(query, r#"(tags: "praise") growth AND mindset"#);
    }

    #[test]
    fn empty_lists_are_ignored() {
        let query = build_query_string(&params(json!({"tags": [], "q": "effort"})));
        assert_eq!(query, "effort");
        assert_eq!(build_query_string(&Map::new()), "");
    }
}
