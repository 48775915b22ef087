//! Cross-entity use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls that span several collections.
//! - Keep denormalized counters (`memberCount`, `messageCount`,
//!   `reactionCount`) in step with the records they count.
//! - Emit side-effect jobs through a [`crate::jobs::JobQueue`].
//!
//! # Invariants
//! - Services never talk to SQLite directly; all reads and writes go through
//!   repositories.
//! - Jobs are enqueued only after the mutation they describe succeeded.

use crate::doc::Document;
use crate::model::Entity;
use crate::repo::{encode, RepoError};
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cleanup_service;
pub mod membership_service;
pub mod message_service;
pub mod metrics_service;
pub mod moderation_service;
pub mod notification_service;
pub mod reaction_service;
pub mod reputation_service;
pub mod thread_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for use-case operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Referenced entity does not exist or is deleted.
    NotFound { collection: &'static str, id: String },
    /// The acting user may not perform the operation.
    Forbidden(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl ServiceError {
    pub fn not_found(collection: &'static str, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { collection, id } => write!(f, "{collection} `{id}` not found"),
            Self::Forbidden(message) => write!(f, "forbidden: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { collection, id } => Self::NotFound { collection, id },
            other => Self::Repo(other),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Repo(RepoError::Store(value))
    }
}

/// Unwraps a lookup result or reports the entity as missing.
pub(crate) fn found<T: Entity>(entity: Option<T>, id: &str) -> ServiceResult<T> {
    entity.ok_or_else(|| ServiceError::not_found(T::COLLECTION, id))
}

/// Stored form of an entity for job payloads.
pub(crate) fn payload<T: Entity>(entity: &T) -> ServiceResult<Document> {
    Ok(encode(entity)?)
}
