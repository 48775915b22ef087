//! Schema and collection migration registry and executor.
//!
//! # Responsibility
//! - Register migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Collection steps are idempotent: re-creating an existing collection is a
//!   no-op.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
enum MigrationStep {
    /// Raw SQL batch (tables, indexes, data backfills).
    Sql(&'static str),
    /// Registers document collections.
    Collections(&'static [&'static str]),
    /// Registers collections, then runs a SQL batch against them.
    CollectionsThenSql(&'static [&'static str], &'static str),
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    step: MigrationStep,
}

/// Collections every deployment starts with.
pub const CORE_COLLECTIONS: &[&str] = &[
    "users",
    "communities",
    "channels",
    "threads",
    "messages",
    "reactions",
    "threadReactions",
    "usersChannels",
    "usersCommunities",
    "usersThreads",
    "usersSettings",
    "notifications",
    "usersNotifications",
    "directMessageThreads",
    "usersDirectMessageThreads",
    "curatedContent",
    "jobs",
];

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents",
        step: MigrationStep::Sql(include_str!("0001_documents.sql")),
    },
    Migration {
        version: 2,
        name: "core-collections",
        step: MigrationStep::Collections(CORE_COLLECTIONS),
    },
    Migration {
        version: 3,
        name: "slack-import",
        step: MigrationStep::Collections(&["slackImports"]),
    },
    Migration {
        version: 4,
        name: "web-push-subscription",
        step: MigrationStep::Collections(&["webPushSubscriptions"]),
    },
    Migration {
        version: 5,
        name: "add-reputation-field-to-communities",
        step: MigrationStep::CollectionsThenSql(
            &["reputationEvents"],
            include_str!("0005_reputation_backfill.sql"),
        ),
    },
    Migration {
        version: 6,
        name: "create-community-settings-table",
        step: MigrationStep::Collections(&["communitySettings"]),
    },
    Migration {
        version: 7,
        name: "create-channel-settings-table",
        step: MigrationStep::Collections(&["channelSettings"]),
    },
    Migration {
        version: 8,
        name: "create-stripe-tables",
        step: MigrationStep::Collections(&["stripeCustomers", "stripeInvoices"]),
    },
    Migration {
        version: 9,
        name: "core-metrics",
        step: MigrationStep::Collections(&["coreMetrics"]),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Returns `(version, name)` for every registered migration.
pub fn migration_names() -> Vec<(u32, &'static str)> {
    MIGRATIONS
        .iter()
        .map(|migration| (migration.version, migration.name))
        .collect()
}

/// Returns the schema version currently recorded in the database.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    validate_registry(MIGRATIONS)?;
    let current_version = current_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        run_step(&tx, migration.step)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=migration_applied module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

fn validate_registry(migrations: &[Migration]) -> DbResult<()> {
    let mut previous = 0;
    for migration in migrations {
        if migration.version <= previous {
            return Err(DbError::InvalidMigrationRegistry {
                previous,
                version: migration.version,
            });
        }
        previous = migration.version;
    }
    Ok(())
}

fn run_step(tx: &Transaction<'_>, step: MigrationStep) -> DbResult<()> {
    match step {
        MigrationStep::Sql(sql) => tx.execute_batch(sql)?,
        MigrationStep::Collections(names) => create_collections(tx, names)?,
        MigrationStep::CollectionsThenSql(names, sql) => {
            create_collections(tx, names)?;
            tx.execute_batch(sql)?;
        }
    }
    Ok(())
}

fn create_collections(tx: &Transaction<'_>, names: &[&str]) -> DbResult<()> {
    let mut stmt = tx.prepare("INSERT OR IGNORE INTO collections (name) VALUES (?1);")?;
    for name in names {
        stmt.execute([name])?;
    }
    Ok(())
}
