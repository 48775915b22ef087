//! Entity documents of the forum platform.
//!
//! # Responsibility
//! - Define typed views over the documents stored in each collection.
//! - Keep field naming identical to the stored camelCase layout.
//!
//! # Invariants
//! - Timestamps are Unix epoch milliseconds.
//! - Deletion is a `deletedAt` tombstone, never a hard delete, except for
//!   join records that are explicitly removed.
//! - Unknown stored fields are ignored on read so joined documents can be
//!   decoded into either side's model.

use crate::doc::{self, Document};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod channel;
pub mod community;
pub mod direct_message;
pub mod membership;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod reaction;
pub mod reputation;
pub mod thread;
pub mod user;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Typed document bound to one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Decodes a stored document.
    fn from_document(source: Document) -> Result<Self, String> {
        doc::from_document(source)
    }

    /// Encodes the entity for storage.
    fn to_document(&self) -> Result<Document, String> {
        doc::to_document(self)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

/// Reporting window used by growth and reputation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Timeframe {
    /// Length of the current window.
    pub fn current_ms(self) -> i64 {
        match self {
            Self::Daily => DAY_MS,
            Self::Weekly => 7 * DAY_MS,
            Self::Monthly => 30 * DAY_MS,
            Self::Quarterly => 90 * DAY_MS,
        }
    }

    /// Combined length of the current and the previous window.
    pub fn previous_ms(self) -> i64 {
        2 * self.current_ms()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            _ => None,
        }
    }
}

/// Count of documents sharing one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub group: String,
    pub count: u64,
}

/// Cursor-less paging: `after` documents are skipped, `first` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub first: Option<u64>,
    pub after: u64,
}

impl Page {
    pub fn new(first: u64, after: u64) -> Self {
        Self {
            first: Some(first),
            after,
        }
    }

    pub fn first(first: u64) -> Self {
        Self::new(first, 0)
    }
}
