//! Repository layer over the document store.
//!
//! # Responsibility
//! - Expose one use-case oriented repository per entity.
//! - Translate typed models to and from stored documents.
//!
//! # Invariants
//! - Every public operation runs through [`crate::query::traced`].
//! - Soft-deleted documents (`deletedAt` present) are excluded from reads
//!   unless an operation states otherwise.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidInput`) in
//!   addition to storage errors; a failed query is never reported as empty.

use crate::doc::Document;
use crate::model::{Entity, GroupCount, Page};
use crate::relate;
use crate::store::{DocumentStore, FindOptions, StoreError};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod channel_repo;
pub mod community_repo;
pub mod curated_content_repo;
pub mod direct_message_repo;
pub mod membership_repo;
pub mod message_repo;
pub mod metrics_repo;
pub mod notification_repo;
pub mod participant_repo;
pub mod reaction_repo;
pub mod reputation_repo;
pub mod search_repo;
pub mod settings_repo;
pub mod thread_repo;
pub mod user_repo;
pub mod web_push_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for repository operations.
#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    NotFound { collection: &'static str, id: String },
    InvalidData(String),
    InvalidInput(String),
}

impl RepoError {
    pub fn not_found(collection: &'static str, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => write!(f, "{collection} `{id}` not found"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub(crate) fn decode<T: Entity>(doc: Document) -> RepoResult<T> {
    T::from_document(doc).map_err(|message| {
        RepoError::InvalidData(format!("{}: {message}", T::COLLECTION))
    })
}

pub(crate) fn decode_opt<T: Entity>(doc: Option<Document>) -> RepoResult<Option<T>> {
    doc.map(decode).transpose()
}

pub(crate) fn decode_all<T: Entity>(docs: Vec<Document>) -> RepoResult<Vec<T>> {
    docs.into_iter().map(decode).collect()
}

pub(crate) fn encode<T: Entity>(entity: &T) -> RepoResult<Document> {
    entity
        .to_document()
        .map_err(|message| RepoError::InvalidInput(format!("{}: {message}", T::COLLECTION)))
}

/// Stores `entity` under a fresh id and returns the stored copy.
pub(crate) fn insert<T: Entity>(store: &DocumentStore<'_>, entity: &T) -> RepoResult<T> {
    let stored = store.insert_one(T::COLLECTION, encode(entity)?)?;
    decode(stored)
}

/// Converts an updated-document option into the entity or `NotFound`.
pub(crate) fn required<T: Entity>(doc: Option<Document>, id: &str) -> RepoResult<T> {
    match doc {
        Some(doc) => decode(doc),
        None => Err(RepoError::not_found(T::COLLECTION, id)),
    }
}

/// Applies `page` on top of `options`.
pub(crate) fn paged(options: FindOptions, page: Page) -> FindOptions {
    let options = options.skip(page.after);
    match page.first {
        Some(first) => options.limit(first),
        None => options,
    }
}

/// Counts `docs` per value of `path`, in first-seen order.
pub(crate) fn count_by(docs: Vec<Document>, path: &str) -> Vec<GroupCount> {
    relate::group_count(relate::group_by_field(docs, path))
        .into_iter()
        .map(|entry| GroupCount {
            group: match entry.group {
                Value::String(key) => key,
                other => other.to_string(),
            },
            count: entry.reduction,
        })
        .collect()
}
