//! Operator CLI for the Agora core.
//!
//! # Responsibility
//! - Open (and migrate) the configured database.
//! - Expose maintenance commands: schema status, collection listing, job
//!   outbox upkeep, metrics snapshots and notification cleanup.

use agora_core::db::migrations::{current_version, latest_version, migration_names};
use agora_core::jobs::REPUTATION_EVENT_QUEUE;
use agora_core::model::{now_ms, HOUR_MS};
use agora_core::relate::{group_by_field, group_count};
use agora_core::service::cleanup_service::{CleanupService, DEFAULT_CLEANUP_BATCH};
use agora_core::service::metrics_service::MetricsService;
use agora_core::service::reputation_service::ReputationService;
use agora_core::{
    core_version, init_logging, open_db, open_db_in_memory, ping, CoreConfig, DocumentStore,
    StoreJobQueue,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rusqlite::Connection;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "agora", version, about = "Agora forum core maintenance")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    /// Database file; overrides the configured path.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core health and version.
    Ping,
    /// Apply pending migrations and print the schema version.
    Migrate {
        /// Also list every registered migration.
        #[arg(long)]
        list: bool,
    },
    /// List registered document collections.
    Collections,
    /// Count unprocessed jobs per queue.
    Jobs,
    /// Apply every pending reputation job.
    ProcessReputation,
    /// Delete processed jobs older than the given age.
    PurgeJobs {
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
    /// Record a core metrics snapshot.
    Metrics,
    /// Delete seen notification deliveries.
    CleanNotifications {
        #[arg(long, default_value_t = DEFAULT_CLEANUP_BATCH)]
        batch_size: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)
            .with_context(|| format!("failed to start logging in {}", log_dir.display()))?;
    }

    match cli.command {
        Command::Ping => {
            println!("agora_core ping={}", ping());
            println!("agora_core version={}", core_version());
        }
        Command::Migrate { list } => {
            let conn = connect(&config)?;
            println!(
                "schema version={} latest={}",
                current_version(&conn)?,
                latest_version()
            );
            if list {
                for (version, name) in migration_names() {
                    println!("{version:>4} {name}");
                }
            }
        }
        Command::Collections => {
            let conn = connect(&config)?;
            let store = DocumentStore::new(&conn);
            for name in store.list_collections()? {
                println!("{name}");
            }
        }
        Command::Jobs => {
            let conn = connect(&config)?;
            let store = DocumentStore::new(&conn);
            let pending = StoreJobQueue::new(&store).all_pending()?;
            for entry in group_count(group_by_field(pending, "queue")) {
                let queue = entry.group.as_str().unwrap_or("unknown");
                println!("{:>6} {queue}", entry.reduction);
            }
        }
        Command::ProcessReputation => {
            let conn = connect(&config)?;
            let store = DocumentStore::new(&conn);
            let handled = ReputationService::new(&store)
                .process_pending(&StoreJobQueue::new(&store))
                .with_context(|| format!("failed to drain `{REPUTATION_EVENT_QUEUE}`"))?;
            info!("event=reputation_drained module=cli handled={handled}");
            println!("processed {handled} reputation job(s)");
        }
        Command::PurgeJobs { older_than_hours } => {
            let conn = connect(&config)?;
            let store = DocumentStore::new(&conn);
            let before_ms = now_ms() - older_than_hours.max(0) * HOUR_MS;
            let purged = StoreJobQueue::new(&store).purge_processed(before_ms)?;
            info!("event=jobs_purged module=cli purged={purged} before_ms={before_ms}");
            println!("purged {purged} processed job(s)");
        }
        Command::Metrics => {
            let conn = connect(&config)?;
            let store = DocumentStore::new(&conn);
            let snapshot = MetricsService::new(&store).record_snapshot()?;
            println!(
                "dau={} wau={} mau={} dac={} wac={} mac={}",
                snapshot.dau, snapshot.wau, snapshot.mau, snapshot.dac, snapshot.wac, snapshot.mac
            );
            println!(
                "users={} communities={} threads={} dm_threads={}",
                snapshot.users, snapshot.communities, snapshot.threads, snapshot.dm_threads
            );
        }
        Command::CleanNotifications { batch_size } => {
            let conn = connect(&config)?;
            let store = DocumentStore::new(&conn);
            let removed = CleanupService::new(&store).purge_seen_notifications(batch_size)?;
            println!("removed {removed} seen notification(s)");
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<CoreConfig> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CoreConfig::default().with_env(std::env::vars())?,
    };
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    Ok(config)
}

fn connect(config: &CoreConfig) -> Result<Connection> {
    let conn = match &config.db_path {
        Some(path) => {
            open_db(path).with_context(|| format!("failed to open database {}", path.display()))?
        }
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_global_db_flag_and_subcommand() {
        let cli = Cli::try_parse_from(["agora", "--db", "/tmp/a.db", "migrate", "--list"]).unwrap();
        assert_eq!(cli.db.as_deref().and_then(|p| p.to_str()), Some("/tmp/a.db"));
        assert!(matches!(cli.command, Command::Migrate { list: true }));
    }

    #[test]
    fn purge_jobs_defaults_to_one_day() {
        let cli = Cli::try_parse_from(["agora", "purge-jobs"]).unwrap();
        assert!(matches!(cli.command, Command::PurgeJobs { older_than_hours: 24 }));
        let cli = Cli::try_parse_from(["agora", "purge-jobs", "--older-than-hours", "2"]).unwrap();
        assert!(matches!(cli.command, Command::PurgeJobs { older_than_hours: 2 }));
    }

    #[test]
    fn clean_notifications_takes_a_batch_size() {
        let cli = Cli::try_parse_from(["agora", "clean-notifications"]).unwrap();
        assert!(matches!(cli.command, Command::CleanNotifications { batch_size: 500 }));
        let cli = Cli::try_parse_from(["agora", "clean-notifications", "--batch-size", "10"]).unwrap();
        assert!(matches!(cli.command, Command::CleanNotifications { batch_size: 10 }));
        assert!(matches!(
            Cli::try_parse_from(["agora", "metrics"]).unwrap().command,
            Command::Metrics
        ));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["agora", "serve"]).is_err());
    }
}
