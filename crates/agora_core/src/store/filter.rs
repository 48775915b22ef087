//! Typed document filters compiled to SQLite JSON predicates.
//!
//! # Responsibility
//! - Express document predicates as a closed enum instead of a string DSL.
//! - Compile predicates into parameterized SQL over `documents.body`.
//!
//! # Invariants
//! - Field paths are validated before any SQL is produced.
//! - User values are always bound, never interpolated.
//! - `missing` matches absent and null fields alike; `exists` is its inverse.
//! - Negation treats unknown (NULL) comparisons as non-matching before
//!   negating, so `ne` also matches documents lacking the field.

use super::{StoreError, StoreResult};
use crate::doc::{is_valid_path, json_path};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Document predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    Exists(String),
    Missing(String),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(path.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(
        path: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Self::Exists(path.into())
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self::Missing(path.into())
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(path.into(), value.into())
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(path.into(), value.into())
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(path.into(), value.into())
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(path.into(), value.into())
    }

    pub fn all_of(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn any_of(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    pub fn negate(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Conjunction with another filter, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Excludes soft-deleted documents.
    pub fn not_deleted(self) -> Self {
        self.and(Self::missing("deletedAt"))
    }

    /// Appends the compiled predicate to `sql` and its parameters to `binds`.
    pub(crate) fn compile(&self, sql: &mut String, binds: &mut Vec<SqlValue>) -> StoreResult<()> {
        match self {
            Self::All => sql.push_str("1 = 1"),
            Self::Eq(path, value) => compile_eq(path, value, sql, binds)?,
            Self::Ne(path, value) => {
                sql.push_str("NOT COALESCE((");
                compile_eq(path, value, sql, binds)?;
                sql.push_str("), 0)");
            }
            Self::In(path, values) => compile_in(path, values, sql, binds)?,
            Self::Exists(path) => {
                field(path, sql, binds)?;
                sql.push_str(" IS NOT NULL");
            }
            Self::Missing(path) => {
                field(path, sql, binds)?;
                sql.push_str(" IS NULL");
            }
            Self::Gt(path, value) => compile_cmp(path, ">", value, sql, binds)?,
            Self::Gte(path, value) => compile_cmp(path, ">=", value, sql, binds)?,
            Self::Lt(path, value) => compile_cmp(path, "<", value, sql, binds)?,
            Self::Lte(path, value) => compile_cmp(path, "<=", value, sql, binds)?,
            Self::And(filters) => compile_group(filters, " AND ", "1 = 1", sql, binds)?,
            Self::Or(filters) => compile_group(filters, " OR ", "0 = 1", sql, binds)?,
            Self::Not(filter) => {
                sql.push_str("NOT COALESCE((");
                filter.compile(sql, binds)?;
                sql.push_str("), 0)");
            }
        }
        Ok(())
    }
}

fn validate(path: &str) -> StoreResult<()> {
    if is_valid_path(path) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(path.to_string()))
    }
}

fn field(path: &str, sql: &mut String, binds: &mut Vec<SqlValue>) -> StoreResult<()> {
    validate(path)?;
    if path == "id" {
        sql.push_str("id");
    } else {
        sql.push_str("json_extract(body, ?)");
        binds.push(SqlValue::Text(json_path(path)));
    }
    Ok(())
}

fn compile_eq(
    path: &str,
    value: &Value,
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<()> {
    match value {
        Value::Null => {
            field(path, sql, binds)?;
            sql.push_str(" IS NULL");
        }
        Value::Bool(flag) => {
            validate(path)?;
            sql.push_str("json_type(body, ?) = ?");
            binds.push(SqlValue::Text(json_path(path)));
            binds.push(SqlValue::Text(if *flag { "true" } else { "false" }.to_string()));
        }
        Value::Array(_) | Value::Object(_) => {
            field(path, sql, binds)?;
            sql.push_str(" = json(?)");
            binds.push(SqlValue::Text(value.to_string()));
        }
        Value::Number(_) | Value::String(_) => {
            field(path, sql, binds)?;
            sql.push_str(" = ?");
            binds.push(to_sql(value));
        }
    }
    Ok(())
}

fn compile_in(
    path: &str,
    values: &[Value],
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<()> {
    validate(path)?;
    if values.is_empty() {
        sql.push_str("0 = 1");
        return Ok(());
    }

    let scalar = values
        .iter()
        .all(|value| matches!(value, Value::String(_) | Value::Number(_)));
    if scalar {
        field(path, sql, binds)?;
        sql.push_str(" IN (");
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            binds.push(to_sql(value));
        }
        sql.push(')');
        return Ok(());
    }

    sql.push('(');
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            sql.push_str(" OR ");
        }
        sql.push('(');
        compile_eq(path, value, sql, binds)?;
        sql.push(')');
    }
    sql.push(')');
    Ok(())
}

fn compile_cmp(
    path: &str,
    op: &str,
    value: &Value,
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<()> {
    field(path, sql, binds)?;
    sql.push(' ');
    sql.push_str(op);
    sql.push_str(" ?");
    binds.push(to_sql(value));
    Ok(())
}

fn compile_group(
    filters: &[Filter],
    joiner: &str,
    empty: &str,
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<()> {
    if filters.is_empty() {
        sql.push_str(empty);
        return Ok(());
    }
    for (index, filter) in filters.iter().enumerate() {
        if index > 0 {
            sql.push_str(joiner);
        }
        sql.push('(');
        filter.compile(sql, binds)?;
        sql.push(')');
    }
    Ok(())
}

/// Maps a JSON scalar to the value `json_extract` yields for it.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::Filter;
    use crate::store::StoreError;
    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    fn compile(filter: &Filter) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut binds = Vec::new();
        filter.compile(&mut sql, &mut binds).unwrap();
        (sql, binds)
    }

    #[test]
    fn eq_binds_path_and_value() {
        let (sql, binds) = compile(&Filter::eq("communityId", "c1"));
        assert_eq!(sql, "json_extract(body, ?) = ?");
        assert_eq!(
            binds,
            vec![
                SqlValue::Text("$.communityId".to_string()),
                SqlValue::Text("c1".to_string())
            ]
        );
    }

    #[test]
    fn id_path_uses_key_column() {
        let (sql, binds) = compile(&Filter::is_in("id", ["a", "b"]));
        assert_eq!(sql, "id IN (?, ?)");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn empty_in_and_empty_or_match_nothing() {
        assert_eq!(compile(&Filter::is_in("id", Vec::<String>::new())).0, "0 = 1");
        assert_eq!(compile(&Filter::any_of(vec![])).0, "0 = 1");
        assert_eq!(compile(&Filter::all_of(vec![])).0, "1 = 1");
    }

    #[test]
    fn and_flattens_nested_conjunctions() {
        let filter = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::All)
            .not_deleted();
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn bool_equality_checks_json_type() {
        let (sql, binds) = compile(&Filter::eq("isPrivate", json!(true)));
        assert_eq!(sql, "json_type(body, ?) = ?");
        assert_eq!(binds[1], SqlValue::Text("true".to_string()));
    }

    #[test]
    fn invalid_path_is_rejected() {
        let mut sql = String::new();
        let mut binds = Vec::new();
        let err = Filter::eq("a) OR (1", 1)
            .compile(&mut sql, &mut binds)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }
}
