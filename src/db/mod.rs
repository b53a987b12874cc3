mod models;

pub use models::*;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Tables every migrated database must contain
pub const REQUIRED_TABLES: [&str; 6] = [
    "voting_sessions",
    "positions",
    "candidates",
    "votes",
    "invited_voters",
    "ballots",
];

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// Open (creating if needed) the database file and bring its schema up to date
pub async fn init(db_path: &Path) -> Result<DbPool> {
    info!("Initializing database at {}", db_path.display());

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Single-connection in-memory database, migrated. Every pooled connection
/// to `:memory:` is a separate database, so the pool never grows past one
/// and never recycles it.
pub async fn connect_in_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Sessions, positions, candidates, votes, invited voters
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Ballots table backing the duplicate-voter guards
    let has_ballots_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='ballots'"
    )
    .fetch_optional(pool)
    .await?;
    if has_ballots_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/002_ballots.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

/// Open a transaction that takes the write lock up front.
///
/// A deferred BEGIN that reads before it writes cannot upgrade its snapshot
/// once another writer has committed, and fails with SQLITE_BUSY instead of
/// waiting. IMMEDIATE makes writers queue on the busy timeout, and every
/// read inside the transaction sees committed state.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// Names of the required tables that are missing from the schema
pub async fn missing_tables(pool: &SqlitePool) -> Result<Vec<&'static str>, sqlx::Error> {
    let present: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table'")
            .fetch_all(pool)
            .await?;

    Ok(REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|(name,)| name == table))
        .collect())
}

/// Current time in the format stored in every timestamp column
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
