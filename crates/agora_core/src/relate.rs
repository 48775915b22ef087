//! Relational helpers over in-memory document sets.
//!
//! # Responsibility
//! - Emulate join, grouping and projection on `Vec<Document>` results.
//! - Stay independent of storage so results can be composed after any query.
//!
//! # Invariants
//! - Every operation is order-preserving: outputs follow input order, groups
//!   follow first-seen key order.
//! - Missing or null join keys never match.
//! - Projection ignores paths that are absent instead of inventing nulls.

use crate::doc::{self, Document};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One matched pair produced by [`eq_join`].
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRow {
    pub left: Document,
    pub right: Document,
}

impl JoinRow {
    /// Merges `right` over `left`; right-hand fields win on conflicts.
    pub fn zip(self) -> Document {
        let mut merged = self.left;
        for (key, value) in self.right {
            merged.insert(key, value);
        }
        merged
    }

    pub fn without_left(mut self, paths: &[&str]) -> Self {
        without_one(&mut self.left, paths);
        self
    }

    pub fn without_right(mut self, paths: &[&str]) -> Self {
        without_one(&mut self.right, paths);
        self
    }
}

/// Hash join of `left` and `right` on `left_field == right_field`.
///
/// Output order is left order, then right order within each left row.
pub fn eq_join(
    left: &[Document],
    left_field: &str,
    right: &[Document],
    right_field: &str,
) -> Vec<JoinRow> {
    let mut index: HashMap<String, Vec<&Document>> = HashMap::new();
    for doc in right {
        if let Some(key) = join_key(doc, right_field) {
            index.entry(key).or_default().push(doc);
        }
    }

    let mut rows = Vec::new();
    for doc in left {
        let Some(key) = join_key(doc, left_field) else {
            continue;
        };
        if let Some(matches) = index.get(&key) {
            for right_doc in matches {
                rows.push(JoinRow {
                    left: doc.clone(),
                    right: (*right_doc).clone(),
                });
            }
        }
    }
    rows
}

fn join_key(doc: &Document, path: &str) -> Option<String> {
    match doc::get(doc, path)? {
        Value::Null => None,
        value => Some(value.to_string()),
    }
}

/// Zips every row of a join result.
pub fn zip(rows: Vec<JoinRow>) -> Vec<Document> {
    rows.into_iter().map(JoinRow::zip).collect()
}

/// Removes dotted `paths` from one document.
pub fn without_one(target: &mut Document, paths: &[&str]) {
    for path in paths {
        doc::remove(target, path);
    }
}

pub fn without(mut docs: Vec<Document>, paths: &[&str]) -> Vec<Document> {
    for target in &mut docs {
        without_one(target, paths);
    }
    docs
}

/// Keeps only dotted `paths`, preserving their nesting.
pub fn pluck_one(source: &Document, paths: &[&str]) -> Document {
    let mut projected = Map::new();
    for path in paths {
        if let Some(value) = doc::get(source, path) {
            doc::set(&mut projected, path, value.clone());
        }
    }
    projected
}

pub fn pluck(docs: &[Document], paths: &[&str]) -> Vec<Document> {
    docs.iter().map(|source| pluck_one(source, paths)).collect()
}

/// Result of a grouping step.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<K, R> {
    pub group: K,
    pub reduction: R,
}

/// Groups items by `key_fn`, keeping first-seen key order and input order
/// within each group.
pub fn group<T, K, F>(items: Vec<T>, mut key_fn: F) -> Vec<Group<K, Vec<T>>>
where
    K: PartialEq,
    F: FnMut(&T) -> K,
{
    let mut groups: Vec<Group<K, Vec<T>>> = Vec::new();
    for item in items {
        let key = key_fn(&item);
        match groups.iter_mut().find(|existing| existing.group == key) {
            Some(existing) => existing.reduction.push(item),
            None => groups.push(Group {
                group: key,
                reduction: vec![item],
            }),
        }
    }
    groups
}

/// Groups documents by the value at `path`; missing fields group under null.
pub fn group_by_field(docs: Vec<Document>, path: &str) -> Vec<Group<Value, Vec<Document>>> {
    group(docs, |source| {
        doc::get(source, path).cloned().unwrap_or(Value::Null)
    })
}

/// Replaces every group's members by their count.
pub fn group_count<K>(groups: Vec<Group<K, Vec<Document>>>) -> Vec<Group<K, u64>> {
    groups
        .into_iter()
        .map(|entry| Group {
            group: entry.group,
            reduction: entry.reduction.len() as u64,
        })
        .collect()
}

/// Maps every member of every group.
pub fn group_map<K, T, U, F>(groups: Vec<Group<K, Vec<T>>>, mut map_fn: F) -> Vec<Group<K, Vec<U>>>
where
    F: FnMut(T) -> U,
{
    groups
        .into_iter()
        .map(|entry| Group {
            group: entry.group,
            reduction: entry.reduction.into_iter().map(&mut map_fn).collect(),
        })
        .collect()
}

/// Folds every group's members starting from `init`.
pub fn group_reduce<K, T, A, F>(groups: Vec<Group<K, Vec<T>>>, init: A, mut fold_fn: F) -> Vec<Group<K, A>>
where
    A: Clone,
    F: FnMut(A, T) -> A,
{
    groups
        .into_iter()
        .map(|entry| Group {
            group: entry.group,
            reduction: entry.reduction.into_iter().fold(init.clone(), &mut fold_fn),
        })
        .collect()
}

/// Removes duplicates, keeping the first occurrence.
pub fn distinct<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// Applies `skip` then `limit`.
pub fn paginate<T>(items: Vec<T>, skip: usize, limit: Option<usize>) -> Vec<T> {
    let remaining = items.into_iter().skip(skip);
    match limit {
        Some(limit) => remaining.take(limit).collect(),
        None => remaining.collect(),
    }
}

/// Flattens nested objects into `(dotted.path, leaf)` pairs.
///
/// Arrays, scalars and empty objects are leaves. A non-object root yields
/// nothing.
pub fn flatten(value: &Value) -> Vec<(String, Value)> {
    let mut leaves = Vec::new();
    if let Value::Object(map) = value {
        flatten_into(map, "", &mut leaves);
    }
    leaves
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, leaves: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_into(nested, &path, leaves),
            leaf => leaves.push((path, leaf.clone())),
        }
    }
}

/// Collects string values at `path`, skipping documents where it is absent.
pub fn string_values(docs: &[Document], path: &str) -> Vec<String> {
    docs.iter()
        .filter_map(|source| doc::get_str(source, path))
        .map(str::to_string)
        .collect()
}
