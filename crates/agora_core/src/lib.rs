//! Core domain logic for the Agora community forum.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod doc;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod pubsub;
pub mod query;
pub mod relate;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use doc::Document;
pub use jobs::{Job, JobQueue, MemoryJobQueue, StoreJobQueue};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{now_ms, Entity, Page, Timeframe};
pub use pubsub::{Event, PubSub, Subscription};
pub use repo::{RepoError, RepoResult};
pub use service::{ServiceError, ServiceResult};
pub use store::{DocumentStore, Filter, FindOptions, StoreError, StoreResult, Update};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
