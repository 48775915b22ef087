//! Document shape and dotted-path helpers.
//!
//! # Responsibility
//! - Define the canonical in-memory document type shared by store and
//!   relational helpers.
//! - Read, write and remove values addressed by dotted field paths.
//! - Convert between documents and typed entity models.
//!
//! # Invariants
//! - A document is always a JSON object; scalar roots are rejected.
//! - Path segments are separated by `.`; arrays are treated as leaves.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Schemaless record stored in a collection.
pub type Document = Map<String, Value>;

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").expect("valid field path regex")
});
static COLLECTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,63}$").expect("valid collection regex"));

/// Returns whether `path` is a well-formed dotted field path.
pub fn is_valid_path(path: &str) -> bool {
    FIELD_PATH_RE.is_match(path)
}

/// Returns whether `name` is an acceptable collection name.
pub fn is_valid_collection(name: &str) -> bool {
    COLLECTION_NAME_RE.is_match(name)
}

/// Converts a dotted path to an SQLite JSON path (`a.b` -> `$.a.b`).
pub fn json_path(path: &str) -> String {
    format!("$.{path}")
}

/// Reads the value at `path`, if every segment exists.
pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Reads a string value at `path`.
pub fn get_str<'a>(doc: &'a Document, path: &str) -> Option<&'a str> {
    get(doc, path).and_then(Value::as_str)
}

/// Writes `value` at `path`, creating intermediate objects.
///
/// Non-object intermediates are replaced by objects.
pub fn set(doc: &mut Document, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = doc;
    for segment in parents {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert((*last).to_string(), value);
}

/// Removes the value at `path`, returning it when present.
pub fn remove(doc: &mut Document, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = doc;
    for segment in parents {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    current.remove(*last)
}

/// Returns whether the value at `path` is present and not null.
pub fn has_value(doc: &Document, path: &str) -> bool {
    matches!(get(doc, path), Some(value) if !value.is_null())
}

/// Serializes a typed model to a document.
///
/// Returns `Err` with a readable message when the model does not serialize
/// to a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, String> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected object, got `{}`", type_name(&other))),
        Err(err) => Err(err.to_string()),
    }
}

/// Deserializes a document into a typed model.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, String> {
    serde_json::from_value(Value::Object(doc)).map_err(|err| err.to_string())
}

/// Short JSON type name used in diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{get, is_valid_collection, is_valid_path, remove, set, Document};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().expect("fixture must be an object")
    }

    #[test]
    fn path_validation_rejects_malformed_paths() {
        assert!(is_valid_path("joinSettings.token"));
        assert!(is_valid_path("_id"));
        assert!(!is_valid_path(""));
        assert!(!is_valid_path("a..b"));
        assert!(!is_valid_path("a.b'); DROP TABLE documents; --"));
        assert!(is_valid_collection("usersChannels"));
        assert!(!is_valid_collection("users channels"));
    }

    #[test]
    fn set_creates_intermediate_objects_and_replaces_scalars() {
        let mut target = doc(json!({ "slackSettings": null }));
        set(&mut target, "slackSettings.botLinks.threadCreated", json!("C123"));
        assert_eq!(
            get(&target, "slackSettings.botLinks.threadCreated"),
            Some(&json!("C123"))
        );
    }

    #[test]
    fn remove_returns_previous_value_and_ignores_missing_paths() {
        let mut target = doc(json!({ "a": { "b": 1, "c": 2 } }));
        assert_eq!(remove(&mut target, "a.b"), Some(json!(1)));
        assert_eq!(remove(&mut target, "a.missing.deep"), None);
        assert_eq!(target, doc(json!({ "a": { "c": 2 } })));
    }
}
