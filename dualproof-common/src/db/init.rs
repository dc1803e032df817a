//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently. The `royalty_events` table carries the
//! `UNIQUE(track_id, result_id)` constraint that enforces exactly-once
//! derivation at the storage layer; the application never relies on a
//! process-local lock for it.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        // Storage waits must surface as errors, never hang the caller
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    apply_schema(&pool).await?;
    Ok(pool)
}

/// Apply PRAGMAs and create all tables (idempotent, safe to re-run)
///
/// Split out from [`init_database`] so tests can run against `:memory:`
/// pools.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer; the correlator is
    // read-only and must never block behind a deriver insert
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_tracks_table(pool).await?;
    create_results_table(pool).await?;
    create_result_matches_table(pool).await?;
    create_usage_logs_table(pool).await?;
    create_royalty_events_table(pool).await?;

    Ok(())
}

/// Catalog entries. Immutable after creation except `chain_tx`
/// (verification metadata written by an external collaborator).
pub async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            embedding BLOB,
            storage_path TEXT,
            chain_tx TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// One aggregate per scored probe; `track_id` is the top match.
pub async fn create_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id TEXT PRIMARY KEY,
            track_id TEXT NOT NULL REFERENCES tracks(id),
            source_path TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_results_track_created
         ON results(track_id, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Ranked match list for one result
pub async fn create_result_matches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS result_matches (
            result_id TEXT NOT NULL REFERENCES results(id),
            track_id TEXT NOT NULL REFERENCES tracks(id),
            rank INTEGER NOT NULL,
            similarity REAL NOT NULL,
            influence_share REAL NOT NULL,
            PRIMARY KEY (result_id, track_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_result_matches_track
         ON result_matches(track_id, similarity)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Partner-reported usage events. Never mutated after creation except to
/// attach the correlated result.
pub async fn create_usage_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usage_logs (
            id TEXT PRIMARY KEY,
            track_id TEXT NOT NULL REFERENCES tracks(id),
            model_id TEXT NOT NULL,
            prompt_hash TEXT,
            confidence REAL,
            result_id TEXT REFERENCES results(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_usage_logs_track_created
         ON usage_logs(track_id, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Derived royalty events. The UNIQUE(track_id, result_id) constraint is
/// the system's core invariant: one event per correlated pair, enforced by
/// storage rather than application locking.
pub async fn create_royalty_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS royalty_events (
            id TEXT PRIMARY KEY,
            track_id TEXT NOT NULL REFERENCES tracks(id),
            result_id TEXT NOT NULL REFERENCES results(id),
            usage_log_id TEXT REFERENCES usage_logs(id),
            similarity REAL NOT NULL,
            payout_weight REAL NOT NULL,
            amount_cents INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            verified_at TEXT NOT NULL,
            UNIQUE (track_id, result_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_royalty_events_result
         ON royalty_events(result_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_royalty_events_usage_log
         ON royalty_events(usage_log_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
