//! Integration tests for database initialization
//!
//! Covers automatic creation, idempotent re-runs, and the uniqueness
//! constraint backing exactly-once derivation.

use dualproof_common::db::init::{apply_schema, init_database};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("engine.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("engine.db");

    let pool1 = init_database(&db_path).await.unwrap();
    drop(pool1);

    // Second open must succeed against the existing file
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_schema_is_idempotent() {
    // One connection: each sqlite :memory: connection is its own database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();

    apply_schema(&pool).await.unwrap();
    apply_schema(&pool).await.unwrap();
}

#[tokio::test]
async fn test_royalty_events_unique_pair_constraint() {
    // One connection: each sqlite :memory: connection is its own database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    apply_schema(&pool).await.unwrap();

    // Foreign keys require real parent rows
    sqlx::query("INSERT INTO tracks (id, title, artist, created_at) VALUES ('t1', 'Title', 'Artist', '2026-08-07T00:00:00.000000Z')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO results (id, track_id, created_at) VALUES ('r1', 't1', '2026-08-07T00:00:00.000000Z')")
        .execute(&pool)
        .await
        .unwrap();

    let insert = "INSERT INTO royalty_events
        (id, track_id, result_id, similarity, payout_weight, amount_cents, status, verified_at)
        VALUES (?, 't1', 'r1', 0.9, 0.5, 50, 'pending', '2026-08-07T00:00:00.000000Z')";

    sqlx::query(insert).bind("e1").execute(&pool).await.unwrap();

    // Second event for the same (track, result) pair must be rejected
    let duplicate = sqlx::query(insert).bind("e2").execute(&pool).await;
    assert!(duplicate.is_err(), "Duplicate (track_id, result_id) was accepted");

    // ON CONFLICT DO NOTHING form must succeed without inserting
    let on_conflict = sqlx::query(
        "INSERT INTO royalty_events
         (id, track_id, result_id, similarity, payout_weight, amount_cents, status, verified_at)
         VALUES ('e3', 't1', 'r1', 0.9, 0.5, 50, 'pending', '2026-08-07T00:00:00.000000Z')
         ON CONFLICT(track_id, result_id) DO NOTHING",
    )
    .execute(&pool)
    .await
    .unwrap();
    assert_eq!(on_conflict.rows_affected(), 0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM royalty_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
