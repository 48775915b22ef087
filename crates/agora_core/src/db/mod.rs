//! Document database bootstrap.
//!
//! # Responsibility
//! - Hand out SQLite connections whose `collections`/`documents` tables are
//!   ready for [`crate::store::DocumentStore`].
//! - Own the migration registry that creates collections and backfills
//!   stored documents.
//!
//! # Invariants
//! - A connection is returned only after every registered migration ran.
//! - The applied version lives in `PRAGMA user_version`; a database written
//!   by a newer binary is refused rather than downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The database was migrated past what this binary knows.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Registered migrations are not strictly increasing.
    InvalidMigrationRegistry { previous: u32, version: u32 },
}

impl DbError {
    /// Error code used in `event=db_open` log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::UnsupportedSchemaVersion { .. } => "schema_too_new",
            Self::InvalidMigrationRegistry { .. } => "migration_registry",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "document schema version {db_version} is newer than this build ({latest_supported})"
            ),
            Self::InvalidMigrationRegistry { previous, version } => write!(
                f,
                "migration {version} is registered after {previous}; versions must increase"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
