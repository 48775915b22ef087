//! Partial document updates.
//!
//! # Responsibility
//! - Describe field-level mutations applied to stored documents.
//! - Apply them in memory so the store can publish before/after images.
//!
//! # Invariants
//! - `id` is immutable; any operation targeting it is rejected.
//! - Operations apply in insertion order.
//! - Counters treat missing or null fields as `0`.

use super::{StoreError, StoreResult};
use crate::doc::{self, is_valid_path, Document};
use crate::relate::flatten;
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc {
        path: String,
        by: i64,
        floor: Option<i64>,
    },
    Push(String, Value),
}

impl UpdateOp {
    fn path(&self) -> &str {
        match self {
            Self::Set(path, _) | Self::Unset(path) | Self::Push(path, _) => path,
            Self::Inc { path, .. } => path,
        }
    }
}

/// Ordered list of field mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.into(), value.into()));
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(path.into()));
        self
    }

    pub fn inc(mut self, path: impl Into<String>, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc {
            path: path.into(),
            by,
            floor: None,
        });
        self
    }

    /// Like [`Update::inc`], clamping the result to at least `floor`.
    pub fn inc_floor(mut self, path: impl Into<String>, by: i64, floor: i64) -> Self {
        self.ops.push(UpdateOp::Inc {
            path: path.into(),
            by,
            floor: Some(floor),
        });
        self
    }

    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push(path.into(), value.into()));
        self
    }

    /// Flattens `patch` into leaf-path sets, leaving sibling fields intact.
    pub fn merge(mut self, patch: Document) -> Self {
        for (path, value) in flatten(&Value::Object(patch)) {
            self.ops.push(UpdateOp::Set(path, value));
        }
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks every path without touching any document.
    pub fn validate(&self) -> StoreResult<()> {
        for op in &self.ops {
            let path = op.path();
            if !is_valid_path(path) {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            if path == "id" {
                return Err(StoreError::InvalidUpdate("`id` cannot be modified".to_string()));
            }
        }
        Ok(())
    }

    /// Applies all operations to `target`; returns whether it changed.
    pub fn apply(&self, target: &mut Document) -> StoreResult<bool> {
        self.validate()?;
        let before = target.clone();

        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => doc::set(target, path, value.clone()),
                UpdateOp::Unset(path) => {
                    doc::remove(target, path);
                }
                UpdateOp::Inc { path, by, floor } => {
                    let next = increment(doc::get(target, path), *by, *floor, path)?;
                    doc::set(target, path, next);
                }
                UpdateOp::Push(path, value) => {
                    let mut items = match doc::get(target, path) {
                        None | Some(Value::Null) => Vec::new(),
                        Some(Value::Array(items)) => items.clone(),
                        Some(other) => {
                            return Err(StoreError::InvalidUpdate(format!(
                                "cannot push onto {} field `{path}`",
                                doc::type_name(other)
                            )))
                        }
                    };
                    items.push(value.clone());
                    doc::set(target, path, Value::Array(items));
                }
            }
        }

        Ok(*target != before)
    }
}

fn increment(current: Option<&Value>, by: i64, floor: Option<i64>, path: &str) -> StoreResult<Value> {
    match current {
        None | Some(Value::Null) => Ok(Value::from(clamp(by, floor))),
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                return Ok(Value::from(clamp(int.saturating_add(by), floor)));
            }
            let float = number.as_f64().unwrap_or_default() + by as f64;
            let float = match floor {
                Some(floor) if float < floor as f64 => floor as f64,
                _ => float,
            };
            Number::from_f64(float).map(Value::Number).ok_or_else(|| {
                StoreError::InvalidUpdate(format!("non-finite result for `{path}`"))
            })
        }
        Some(other) => Err(StoreError::InvalidUpdate(format!(
            "cannot increment {} field `{path}`",
            doc::type_name(other)
        ))),
    }
}

fn clamp(value: i64, floor: Option<i64>) -> i64 {
    match floor {
        Some(floor) => value.max(floor),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::Update;
    use crate::doc::Document;
    use crate::store::StoreError;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn inc_treats_missing_as_zero_and_floor_clamps() {
        let mut target = doc(json!({ "memberCount": 0 }));
        let changed = Update::new()
            .inc_floor("memberCount", -1, 0)
            .inc("messageCount", 2)
            .apply(&mut target)
            .unwrap();
        assert!(changed);
        assert_eq!(target, doc(json!({ "memberCount": 0, "messageCount": 2 })));
    }

    #[test]
    fn merge_keeps_siblings_and_falsy_values() {
        let mut target = doc(json!({
            "slackSettings": { "connectedAt": 1, "teamName": "old" },
            "name": "n"
        }));
        Update::new()
            .merge(doc(json!({ "slackSettings": { "teamName": "new", "invitesSentAt": null }, "isPrivate": false })))
            .apply(&mut target)
            .unwrap();
        assert_eq!(
            target,
            doc(json!({
                "slackSettings": { "connectedAt": 1, "teamName": "new", "invitesSentAt": null },
                "name": "n",
                "isPrivate": false
            }))
        );
    }

    #[test]
    fn push_appends_and_creates_arrays() {
        let mut target = doc(json!({ "edits": [1] }));
        Update::new()
            .push("edits", 2)
            .push("actors", "u1")
            .apply(&mut target)
            .unwrap();
        assert_eq!(target, doc(json!({ "edits": [1, 2], "actors": ["u1"] })));
    }

    #[test]
    fn unchanged_update_reports_no_change() {
        let mut target = doc(json!({ "isOnline": true }));
        let changed = Update::new().set("isOnline", true).apply(&mut target).unwrap();
        assert!(!changed);
    }

    #[test]
    fn id_and_type_mismatches_are_rejected() {
        let mut target = doc(json!({ "id": "a", "name": "x" }));
        assert!(matches!(
            Update::new().set("id", "b").apply(&mut target),
            Err(StoreError::InvalidUpdate(_))
        ));
        assert!(matches!(
            Update::new().inc("name", 1).apply(&mut target),
            Err(StoreError::InvalidUpdate(_))
        ));
        assert_eq!(target, doc(json!({ "id": "a", "name": "x" })));
    }
}
