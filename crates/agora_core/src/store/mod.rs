//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist schemaless JSON documents grouped by collection.
//! - Provide generic CRUD over typed filters and partial updates.
//! - Publish change events for every committed mutation.
//!
//! # Invariants
//! - Every stored document is a JSON object carrying a string `id` that equals
//!   the row key; inserts always assign a fresh UUID v4.
//! - Multi-document writes commit atomically.
//! - Change events are published only after commit and only for documents
//!   whose content actually changed.
//! - Default result order is insertion order.

use crate::db::DbError;
use crate::doc::{self, is_valid_collection, json_path, Document};
use crate::pubsub::{changed_topic, Event, PubSub};
use crate::relate::{eq_join, JoinRow};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod filter;
pub mod update;

pub use filter::Filter;
pub use update::{Update, UpdateOp};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for document store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Json(serde_json::Error),
    InvalidCollection(String),
    InvalidPath(String),
    InvalidUpdate(String),
    InvalidDocument(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid document json: {err}"),
            Self::InvalidCollection(name) => write!(f, "invalid collection name: `{name}`"),
            Self::InvalidPath(path) => write!(f, "invalid field path: `{path}`"),
            Self::InvalidUpdate(message) => write!(f, "invalid update: {message}"),
            Self::InvalidDocument(message) => write!(f, "invalid document: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidCollection(_)
            | Self::InvalidPath(_)
            | Self::InvalidUpdate(_)
            | Self::InvalidDocument(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub path: String,
    pub direction: Direction,
}

/// Ordering and paging for [`DocumentStore::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Vec<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_asc(mut self, path: impl Into<String>) -> Self {
        self.sort.push(Sort {
            path: path.into(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn sort_desc(mut self, path: impl Into<String>) -> Self {
        self.sort.push(Sort {
            path: path.into(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Before/after image of one committed document mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: String,
    pub kind: ChangeKind,
    pub old: Option<Document>,
    pub new: Option<Document>,
}

/// Document store bound to one connection and an optional change bus.
pub struct DocumentStore<'conn> {
    conn: &'conn Connection,
    bus: Option<&'conn PubSub>,
}

impl<'conn> DocumentStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn, bus: None }
    }

    /// Attaches a bus that receives change events after each commit.
    pub fn with_bus(mut self, bus: &'conn PubSub) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn bus(&self) -> Option<&'conn PubSub> {
        self.bus
    }

    /// Registers collections; existing ones are left untouched.
    pub fn create_collections(&self, names: &[&str]) -> StoreResult<()> {
        for name in names {
            self.ensure_collection(name)?;
        }
        Ok(())
    }

    /// Removes collections together with all of their documents.
    pub fn drop_collections(&self, names: &[&str]) -> StoreResult<()> {
        for name in names {
            validate_collection(name)?;
        }
        let tx = self.conn.unchecked_transaction()?;
        for name in names {
            tx.execute("DELETE FROM documents WHERE collection = ?1;", [name])?;
            tx.execute("DELETE FROM collections WHERE name = ?1;", [name])?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        validate_collection(name)?;
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM collections WHERE name = ?1;",
                [name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }

    pub fn list_collections(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM collections ORDER BY name ASC;")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Stores `doc` under a freshly generated id and returns the stored copy.
    pub fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        let mut stored = self.insert_many(collection, vec![doc])?;
        stored
            .pop()
            .ok_or_else(|| StoreError::InvalidDocument("insert produced no document".to_string()))
    }

    /// Like [`DocumentStore::insert_one`] for arbitrary JSON values.
    ///
    /// # Errors
    /// - `InvalidDocument` when `value` is not an object.
    pub fn insert_value(&self, collection: &str, value: Value) -> StoreResult<Document> {
        match value {
            Value::Object(doc) => self.insert_one(collection, doc),
            other => Err(StoreError::InvalidDocument(format!(
                "expected object, got {}",
                doc::type_name(&other)
            ))),
        }
    }

    /// Stores all documents in one transaction.
    pub fn insert_many(&self, collection: &str, docs: Vec<Document>) -> StoreResult<Vec<Document>> {
        self.ensure_collection(collection)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut stored = Vec::with_capacity(docs.len());
        {
            let mut stmt =
                tx.prepare("INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3);")?;
            for mut doc in docs {
                let id = Uuid::new_v4().to_string();
                doc.insert("id".to_string(), Value::String(id.clone()));
                let body = serde_json::to_string(&doc)?;
                stmt.execute(params![collection, id, body])?;
                stored.push(doc);
            }
        }
        tx.commit()?;

        debug!(
            "event=store_insert module=store status=ok collection={collection} count={}",
            stored.len()
        );
        for doc in &stored {
            self.publish(collection, ChangeKind::Inserted, None, Some(doc.clone()));
        }
        Ok(stored)
    }

    pub fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        validate_collection(collection)?;

        let mut sql = String::from("SELECT body FROM documents WHERE collection = ? AND (");
        let mut bind_values: Vec<SqlValue> = vec![SqlValue::Text(collection.to_string())];
        filter.compile(&mut sql, &mut bind_values)?;
        sql.push(')');

        sql.push_str(" ORDER BY ");
        for sort in &options.sort {
            if !doc::is_valid_path(&sort.path) {
                return Err(StoreError::InvalidPath(sort.path.clone()));
            }
            sql.push_str("json_extract(body, ?) ");
            sql.push_str(match sort.direction {
                Direction::Asc => "ASC, ",
                Direction::Desc => "DESC, ",
            });
            bind_values.push(SqlValue::Text(json_path(&sort.path)));
        }
        sql.push_str("rowid ASC");

        match options.limit {
            Some(limit) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                bind_values.push(SqlValue::Integer(to_i64(limit)));
                bind_values.push(SqlValue::Integer(to_i64(options.skip)));
            }
            None if options.skip > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bind_values.push(SqlValue::Integer(to_i64(options.skip)));
            }
            None => {}
        }
        sql.push(';');

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values.iter()))?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            docs.push(parse_body(&body)?);
        }
        Ok(docs)
    }

    pub fn find_all(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.find(collection, filter, &FindOptions::default())
    }

    pub fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let mut docs = self.find(collection, filter, &FindOptions::new().limit(1))?;
        Ok(docs.pop())
    }

    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.find_one(collection, &Filter::eq("id", id))
    }

    /// Fetches documents by id, preserving the order of `ids` and skipping
    /// unknown ids.
    pub fn get_many(&self, collection: &str, ids: &[String]) -> StoreResult<Vec<Document>> {
        let found = self.find_all(collection, &Filter::is_in("id", ids.iter().cloned()))?;
        let mut ordered = Vec::with_capacity(found.len());
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(doc) = found
                .iter()
                .find(|doc| doc::get_str(doc, "id") == Some(id.as_str()))
            {
                ordered.push(doc.clone());
            }
        }
        Ok(ordered)
    }

    pub fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        validate_collection(collection)?;

        let mut sql = String::from("SELECT COUNT(*) FROM documents WHERE collection = ? AND (");
        let mut bind_values: Vec<SqlValue> = vec![SqlValue::Text(collection.to_string())];
        filter.compile(&mut sql, &mut bind_values)?;
        sql.push_str(");");

        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Updates the first matching document and returns it after the update.
    pub fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<Option<Document>> {
        update.validate()?;
        let Some(old) = self.find_one(collection, filter)? else {
            return Ok(None);
        };

        let mut new = old.clone();
        if !update.apply(&mut new)? {
            return Ok(Some(new));
        }
        write_body(self.conn, collection, &new)?;
        self.publish(collection, ChangeKind::Updated, Some(old), Some(new.clone()));
        Ok(Some(new))
    }

    /// Updates a document by id.
    pub fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        update: &Update,
    ) -> StoreResult<Option<Document>> {
        self.update_one(collection, &Filter::eq("id", id), update)
    }

    /// Updates every match atomically and returns the matched documents after
    /// the update.
    pub fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<Vec<Document>> {
        update.validate()?;
        let matched = self.find_all(collection, filter)?;

        let mut changes = Vec::new();
        let mut results = Vec::with_capacity(matched.len());
        let tx = self.conn.unchecked_transaction()?;
        for old in matched {
            let mut new = old.clone();
            if update.apply(&mut new)? {
                write_body(&tx, collection, &new)?;
                changes.push((old, new.clone()));
            }
            results.push(new);
        }
        tx.commit()?;

        debug!(
            "event=store_update module=store status=ok collection={collection} matched={} changed={}",
            results.len(),
            changes.len()
        );
        for (old, new) in changes {
            self.publish(collection, ChangeKind::Updated, Some(old), Some(new));
        }
        Ok(results)
    }

    /// Deletes every match and returns the number of removed documents.
    pub fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let matched = self.find_all(collection, filter)?;
        if matched.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM documents WHERE collection = ?1 AND id = ?2;")?;
            for doc in &matched {
                stmt.execute(params![collection, doc::get_str(doc, "id")])?;
            }
        }
        tx.commit()?;

        let removed = matched.len();
        for doc in matched {
            self.publish(collection, ChangeKind::Deleted, Some(doc), None);
        }
        Ok(removed)
    }

    /// Hash-joins `left` with right documents whose `right_field` matches.
    pub fn join(
        &self,
        left: Vec<Document>,
        left_field: &str,
        right_collection: &str,
        right_field: &str,
    ) -> StoreResult<Vec<JoinRow>> {
        self.join_filtered(left, left_field, right_collection, right_field, &Filter::All)
    }

    /// Like [`DocumentStore::join`] with an extra predicate on the right side.
    pub fn join_filtered(
        &self,
        left: Vec<Document>,
        left_field: &str,
        right_collection: &str,
        right_field: &str,
        right_filter: &Filter,
    ) -> StoreResult<Vec<JoinRow>> {
        let mut keys: Vec<Value> = Vec::new();
        for doc in &left {
            if let Some(key) = doc::get(doc, left_field).filter(|key| !key.is_null()) {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::is_in(right_field, keys).and(right_filter.clone());
        let right = self.find_all(right_collection, &filter)?;
        Ok(eq_join(&left, left_field, &right, right_field))
    }

    fn ensure_collection(&self, name: &str) -> StoreResult<()> {
        validate_collection(name)?;
        self.conn
            .execute("INSERT OR IGNORE INTO collections (name) VALUES (?1);", [name])?;
        Ok(())
    }

    fn publish(
        &self,
        collection: &str,
        kind: ChangeKind,
        old: Option<Document>,
        new: Option<Document>,
    ) {
        let Some(bus) = self.bus else {
            return;
        };
        let delivered = bus.publish(
            &changed_topic(collection),
            Event::Changed(ChangeEvent {
                collection: collection.to_string(),
                kind,
                old,
                new,
            }),
        );
        debug!(
            "event=change_published module=store collection={collection} kind={} delivered={delivered}",
            kind.as_str()
        );
    }
}

fn validate_collection(name: &str) -> StoreResult<()> {
    if is_valid_collection(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

fn parse_body(body: &str) -> StoreResult<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::InvalidDocument(format!(
            "stored body is {}, expected object",
            doc::type_name(&other)
        ))),
    }
}

fn write_body(conn: &Connection, collection: &str, doc: &Document) -> StoreResult<()> {
    let id = doc::get_str(doc, "id")
        .ok_or_else(|| StoreError::InvalidDocument("document has no string `id`".to_string()))?;
    let body = serde_json::to_string(doc)?;
    conn.execute(
        "UPDATE documents SET body = ?1 WHERE collection = ?2 AND id = ?3;",
        params![body, collection, id],
    )?;
    Ok(())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
